use reqwest::Url;
use std::env;
use std::fmt;
use std::time::Duration;

use super::constants::{
    DEFAULT_MAX_WORKERS, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT, MAX_CHARS_LIMIT,
};
use super::voice::Voice;
use crate::audio::AudioFormat;
use crate::chunking::{BoundaryConfig, ChunkingConfig};
use crate::error::{Result, TtsError};

const PLACEHOLDER_KEY: &str = "YOUR_API_KEY_HERE";
const PLACEHOLDER_RESOURCE: &str = "your-resource";

/// API key that never shows up in `Debug` output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, for the auth header only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Last four characters, the rest starred out
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Settings for one session, immutable while a conversion runs
#[derive(Debug, Clone)]
pub struct Config {
    /// Full speech endpoint URL (including any `api-version` query)
    pub endpoint: Url,
    pub api_key: ApiKey,
    pub voice: Voice,
    pub model: String,
    pub response_format: AudioFormat,
    /// Maximum characters per chunk (1..=4000)
    pub max_chars: usize,
    /// Maximum concurrent synthesis calls (>= 1)
    pub max_workers: usize,
    pub request_timeout: Duration,
    pub boundaries: BoundaryConfig,
}

impl Config {
    /// Create a validated configuration with default settings
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| TtsError::Config(format!("invalid endpoint URL '{}': {}", endpoint, e)))?;

        let config = Self {
            endpoint,
            api_key: ApiKey::new(api_key.into().trim()),
            voice: Voice::default(),
            model: DEFAULT_MODEL.to_string(),
            response_format: AudioFormat::default(),
            max_chars: MAX_CHARS_LIMIT,
            max_workers: DEFAULT_MAX_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            boundaries: BoundaryConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |primary: &str, alias: &str| {
            lookup(primary)
                .or_else(|| lookup(alias))
                .filter(|v| !v.trim().is_empty())
        };

        let endpoint = var("TTS_ENDPOINT", "AZURE_TTS_ENDPOINT")
            .ok_or_else(|| TtsError::Config("TTS_ENDPOINT is not set".to_string()))?;
        let api_key = var("TTS_API_KEY", "AZURE_API_KEY")
            .ok_or_else(|| TtsError::Config("TTS_API_KEY is not set".to_string()))?;

        let mut config = Self::new(&endpoint, api_key)?;

        if let Some(voice) = var("TTS_VOICE", "DEFAULT_VOICE") {
            config.voice = voice.parse()?;
        }

        if let Some(model) = lookup("TTS_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }

        if let Some(format) = lookup("TTS_RESPONSE_FORMAT").filter(|f| !f.trim().is_empty()) {
            config.response_format = format.parse()?;
        }

        config.max_chars = parse_or(
            var("TTS_MAX_CHARS", "MAX_CHARS_PER_CHUNK"),
            "TTS_MAX_CHARS",
            config.max_chars,
        );
        config.max_workers = parse_or(
            var("TTS_MAX_WORKERS", "MAX_WORKERS"),
            "TTS_MAX_WORKERS",
            config.max_workers,
        );
        config.request_timeout = Duration::from_secs(parse_or(
            lookup("TTS_REQUEST_TIMEOUT_SECONDS"),
            "TTS_REQUEST_TIMEOUT_SECONDS",
            config.request_timeout.as_secs(),
        ));

        if let Some(terminators) = lookup("TTS_SENTENCE_TERMINATORS") {
            config.boundaries.sentence_terminators = BoundaryConfig::parse_chars(&terminators);
        }
        if let Some(separators) = lookup("TTS_CLAUSE_SEPARATORS") {
            config.boundaries.clause_separators = BoundaryConfig::parse_chars(&separators);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every setting; failures are fatal before any network activity
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.endpoint.scheme(), "http" | "https") {
            return Err(TtsError::Config(format!(
                "endpoint must be http(s), got '{}'",
                self.endpoint.scheme()
            )));
        }
        if self.endpoint.as_str().to_ascii_lowercase().contains(PLACEHOLDER_RESOURCE) {
            return Err(TtsError::Config(
                "endpoint still contains the YOUR-RESOURCE placeholder".to_string(),
            ));
        }
        if self.api_key.expose().is_empty() || self.api_key.expose() == PLACEHOLDER_KEY {
            return Err(TtsError::Config("API key is missing".to_string()));
        }
        if self.max_chars == 0 || self.max_chars > MAX_CHARS_LIMIT {
            return Err(TtsError::Config(format!(
                "max_chars must be between 1 and {}, got {}",
                MAX_CHARS_LIMIT, self.max_chars
            )));
        }
        if self.max_workers == 0 {
            return Err(TtsError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.model.is_empty() {
            return Err(TtsError::Config("model must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            max_chars: self.max_chars,
            boundaries: self.boundaries.clone(),
        }
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_response_format(mut self, format: AudioFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + fmt::Display + Copy,
{
    match value {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}='{}', using {}", name, raw, default);
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ENDPOINT: &str =
        "https://example.openai.azure.com/openai/deployments/tts/audio/speech?api-version=2025-03-01-preview";

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(ENDPOINT, "secret-key-123456").unwrap();
        assert_eq!(config.voice, Voice::Alloy);
        assert_eq!(config.max_chars, 4000);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.model, "gpt-4o-mini-tts");
        assert_eq!(config.response_format, AudioFormat::Mp3);
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("TTS_ENDPOINT", ENDPOINT),
            ("TTS_API_KEY", "secret-key-123456"),
            ("TTS_VOICE", "nova"),
            ("TTS_MAX_CHARS", "1200"),
            ("TTS_MAX_WORKERS", "5"),
            ("TTS_RESPONSE_FORMAT", "wav"),
            ("TTS_REQUEST_TIMEOUT_SECONDS", "10"),
            ("TTS_SENTENCE_TERMINATORS", ". ! ? ।"),
        ]))
        .unwrap();

        assert_eq!(config.voice, Voice::Nova);
        assert_eq!(config.max_chars, 1200);
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.response_format, AudioFormat::Wav);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.boundaries.sentence_terminators,
            vec!['.', '!', '?', '।']
        );
    }

    #[test]
    fn test_azure_aliases_are_accepted() {
        let config = Config::from_lookup(lookup_from(&[
            ("AZURE_TTS_ENDPOINT", ENDPOINT),
            ("AZURE_API_KEY", "secret-key-123456"),
            ("MAX_WORKERS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.max_workers, 2);
    }

    #[test]
    fn test_missing_endpoint_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("TTS_API_KEY", "k")])).unwrap_err();
        assert!(err.to_string().contains("TTS_ENDPOINT"));
    }

    #[test]
    fn test_invalid_number_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[
            ("TTS_ENDPOINT", ENDPOINT),
            ("TTS_API_KEY", "secret-key-123456"),
            ("TTS_MAX_WORKERS", "many"),
        ]))
        .unwrap();
        assert_eq!(config.max_workers, 3);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("TTS_ENDPOINT", ENDPOINT),
            ("TTS_API_KEY", "secret-key-123456"),
            ("TTS_RESPONSE_FORMAT", ""),
            ("TTS_MODEL", "  "),
            ("TTS_VOICE", ""),
        ]))
        .unwrap();
        assert_eq!(config.response_format, AudioFormat::Mp3);
        assert_eq!(config.voice, Voice::Alloy);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let base = Config::new(ENDPOINT, "secret-key-123456").unwrap();
        assert!(base.clone().with_max_chars(0).validate().is_err());
        assert!(base.clone().with_max_chars(4001).validate().is_err());
        assert!(base.clone().with_max_workers(0).validate().is_err());
        assert!(base.with_max_chars(4000).validate().is_ok());
    }

    #[test]
    fn test_placeholders_are_rejected() {
        assert!(Config::new(ENDPOINT, "YOUR_API_KEY_HERE").is_err());
        assert!(Config::new(
            "https://YOUR-RESOURCE.openai.azure.com/openai/deployments/x/audio/speech",
            "secret-key-123456"
        )
        .is_err());
        assert!(Config::new("ftp://example.com/speech", "secret-key-123456").is_err());
    }

    #[test]
    fn test_api_key_is_never_printed() {
        let config = Config::new(ENDPOINT, "secret-key-123456").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key-123456"));
        assert_eq!(config.api_key.masked(), "*************3456");
    }
}
