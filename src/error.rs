use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Failure of a single synthesis call.
///
/// Captured into the chunk's result by the dispatcher; never aborts sibling chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Network(String),
    Timeout,
    Status { status: u16, message: String },
    EmptyPayload,
    MalformedPayload(String),
    /// The worker task died before producing a result (panic or abort).
    Worker(String),
}

impl RemoteError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::Status { status: 429, .. })
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RemoteError::Status { status: 401 | 403, .. })
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Network(msg) => write!(f, "network error: {}", msg),
            RemoteError::Timeout => write!(f, "request timed out"),
            RemoteError::Status { status, message } if message.is_empty() => {
                write!(f, "API returned HTTP {}", status)
            }
            RemoteError::Status { status, message } => {
                write!(f, "API returned HTTP {}: {}", status, message)
            }
            RemoteError::EmptyPayload => write!(f, "API returned an empty audio payload"),
            RemoteError::MalformedPayload(msg) => write!(f, "malformed API response: {}", msg),
            RemoteError::Worker(msg) => write!(f, "synthesis worker failed: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

/// Invalid chunking parameters, detected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    ZeroLimit,
}

impl fmt::Display for ChunkingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkingError::ZeroLimit => write!(f, "max_chars must be greater than zero"),
        }
    }
}

impl std::error::Error for ChunkingError {}

/// One failed chunk within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    /// 0-based chunk index
    pub index: usize,
    pub reason: RemoteError,
}

/// Report of every chunk that failed in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateFailure {
    pub total: usize,
    pub failures: Vec<ChunkFailure>,
}

impl AggregateFailure {
    /// Indices that can be resubmitted as a retry.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    pub fn is_total(&self) -> bool {
        self.failures.len() == self.total
    }

    /// Human-readable lines, one per failed chunk ("chunk 3 of 7 failed: ...").
    pub fn lines(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| {
                format!(
                    "chunk {} of {} failed: {}",
                    f.index + 1,
                    self.total,
                    f.reason
                )
            })
            .collect()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} chunks failed: {}",
            self.failures.len(),
            self.total,
            self.lines().join("; ")
        )
    }
}

impl std::error::Error for AggregateFailure {}

#[derive(Debug)]
pub enum TtsError {
    // I/O errors
    Io(std::io::Error),

    // Configuration errors
    Config(String),
    Chunking(ChunkingError),

    // Pipeline errors
    Aggregate(AggregateFailure),
    Cancelled,
    Busy,

    // Audio processing errors
    AudioParsing(String),
    WavConcatenation(String),
    Playback(String),

    // Request validation errors
    InvalidRequest(String),
    EmptyText,
    UnknownVoice(String),

    // Internal errors
    TaskJoin(String),
    Unknown(String),
}

impl fmt::Display for TtsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtsError::Io(e) => write!(f, "I/O error: {}", e),
            TtsError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TtsError::Chunking(e) => write!(f, "Chunking error: {}", e),
            TtsError::Aggregate(failure) => write!(f, "{}", failure),
            TtsError::Cancelled => write!(f, "Conversion cancelled"),
            TtsError::Busy => write!(f, "A conversion is already running"),
            TtsError::AudioParsing(msg) => write!(f, "Audio parsing error: {}", msg),
            TtsError::WavConcatenation(msg) => write!(f, "WAV concatenation error: {}", msg),
            TtsError::Playback(msg) => write!(f, "Playback error: {}", msg),
            TtsError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            TtsError::EmptyText => write!(f, "Text cannot be empty"),
            TtsError::UnknownVoice(voice) => write!(
                f,
                "Unknown voice '{}' (expected one of alloy, echo, fable, onyx, nova, shimmer)",
                voice
            ),
            TtsError::TaskJoin(msg) => write!(f, "Task execution error: {}", msg),
            TtsError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for TtsError {}

// Conversions
impl From<std::io::Error> for TtsError {
    fn from(err: std::io::Error) -> Self {
        TtsError::Io(err)
    }
}

impl From<ChunkingError> for TtsError {
    fn from(err: ChunkingError) -> Self {
        TtsError::Chunking(err)
    }
}

impl From<AggregateFailure> for TtsError {
    fn from(err: AggregateFailure) -> Self {
        TtsError::Aggregate(err)
    }
}

impl From<hound::Error> for TtsError {
    fn from(err: hound::Error) -> Self {
        TtsError::AudioParsing(err.to_string())
    }
}

impl From<serde_json::Error> for TtsError {
    fn from(err: serde_json::Error) -> Self {
        TtsError::Unknown(err.to_string())
    }
}

impl From<tokio::task::JoinError> for TtsError {
    fn from(err: tokio::task::JoinError) -> Self {
        TtsError::TaskJoin(err.to_string())
    }
}

// Axum integration
impl IntoResponse for TtsError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            TtsError::EmptyText | TtsError::InvalidRequest(_) | TtsError::UnknownVoice(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            TtsError::Aggregate(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            TtsError::Busy | TtsError::Cancelled => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            _ => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status,
            axum::Json(serde_json::json!({
                "success": false,
                "error": message
            })),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, TtsError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_failure() -> AggregateFailure {
        AggregateFailure {
            total: 7,
            failures: vec![
                ChunkFailure {
                    index: 2,
                    reason: RemoteError::Timeout,
                },
                ChunkFailure {
                    index: 5,
                    reason: RemoteError::Status {
                        status: 429,
                        message: "Too many requests".to_string(),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_aggregate_failure_names_positions() {
        let failure = sample_failure();
        let lines = failure.lines();

        assert_eq!(lines[0], "chunk 3 of 7 failed: request timed out");
        assert_eq!(
            lines[1],
            "chunk 6 of 7 failed: API returned HTTP 429: Too many requests"
        );
        assert!(failure.to_string().starts_with("2 of 7 chunks failed"));
    }

    #[test]
    fn test_failed_indices_are_zero_based() {
        assert_eq!(sample_failure().failed_indices(), vec![2, 5]);
        assert!(!sample_failure().is_total());
    }

    #[test]
    fn test_remote_error_classification() {
        let limited = RemoteError::Status {
            status: 429,
            message: String::new(),
        };
        assert!(limited.is_rate_limited());
        assert!(!limited.is_auth_failure());
        assert_eq!(limited.to_string(), "API returned HTTP 429");

        let denied = RemoteError::Status {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(denied.is_auth_failure());
    }

    #[test]
    fn test_aggregate_response_is_bad_gateway() {
        let response = TtsError::Aggregate(sample_failure()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = TtsError::EmptyText.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
