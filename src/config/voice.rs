use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TtsError;

/// Voice configuration with metadata
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl VoiceConfig {
    pub const fn new(id: &'static str, name: &'static str, description: &'static str) -> Self {
        Self {
            id,
            name,
            description,
        }
    }
}

/// Voices accepted by the speech endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    /// Get the voice configuration for this voice
    pub const fn config(&self) -> VoiceConfig {
        match self {
            Voice::Alloy => VoiceConfig::new("alloy", "Alloy", "Neutral, balanced voice"),
            Voice::Echo => VoiceConfig::new("echo", "Echo", "Warm, measured voice"),
            Voice::Fable => VoiceConfig::new("fable", "Fable", "Expressive storytelling voice"),
            Voice::Onyx => VoiceConfig::new("onyx", "Onyx", "Deep, authoritative voice"),
            Voice::Nova => VoiceConfig::new("nova", "Nova", "Bright, energetic voice"),
            Voice::Shimmer => VoiceConfig::new("shimmer", "Shimmer", "Soft, clear voice"),
        }
    }

    /// Get the voice ID string sent to the API
    pub const fn id(&self) -> &'static str {
        self.config().id
    }

    /// Get all available voices as an array
    pub const fn all() -> [Voice; 6] {
        [
            Voice::Alloy,
            Voice::Echo,
            Voice::Fable,
            Voice::Onyx,
            Voice::Nova,
            Voice::Shimmer,
        ]
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Voice {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Voice::all()
            .into_iter()
            .find(|v| v.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TtsError::UnknownVoice(wanted.to_string()))
    }
}
