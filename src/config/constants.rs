use std::time::Duration;

/// Hard per-call character limit documented by the speech API
pub const API_CHAR_LIMIT: usize = 4096;

/// Largest `max_chars` accepted from configuration
///
/// Kept below the API limit to leave a safety margin.
pub const MAX_CHARS_LIMIT: usize = 4000;

/// Default number of concurrent synthesis calls
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Default per-call timeout for the speech API
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default speech model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini-tts";

/// Default port for the HTTP front end
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Upper bound on one HTTP front-end request, dispatch and concatenation included
pub const SERVER_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum accepted document length for the HTTP front end (in characters)
pub const MAX_TEXT_LENGTH: usize = 200_000;
