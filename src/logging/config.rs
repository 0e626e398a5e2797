use std::env;

const DEFAULT_CONSOLE_FILTER: &str = "tts_relay=info";

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Custom log directory path (overrides auto-detection)
    pub custom_log_dir: Option<String>,

    /// Filter for console output (default: "tts_relay=info")
    pub console_log_level: String,

    /// Filter for the JSON log file (default: "debug")
    pub file_log_level: String,

    /// Write the JSON log file at all (default: false)
    pub file_enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            custom_log_dir: None,
            console_log_level: DEFAULT_CONSOLE_FILTER.to_string(),
            file_log_level: "debug".to_string(),
            file_enabled: false,
        }
    }
}

impl LogConfig {
    /// Load logging configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("TTS_RELAY_LOG_DIR") {
            config.custom_log_dir = Some(dir);
            config.file_enabled = true;
        }

        if let Some(filter) = lookup("RUST_LOG") {
            config.console_log_level = filter;
        }

        if let Some(level) = lookup("TTS_RELAY_FILE_LOG_LEVEL") {
            config.file_log_level = level;
        }

        // An explicit switch wins over the directory implying it
        if let Some(val) = lookup("LOG_TO_FILE") {
            config.file_enabled = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        config
    }
}
