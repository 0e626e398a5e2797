use serde::Deserialize;

use crate::config::constants::MAX_TEXT_LENGTH;
use crate::config::Voice;
use crate::error::{Result, TtsError};

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub text: String,
    /// Voice id; the server's configured voice when absent
    #[serde(default)]
    pub voice: Option<String>,
}

impl ConvertRequest {
    /// Check the text and resolve the voice, falling back to `default_voice`
    pub fn validate(&self, default_voice: Voice) -> Result<Voice> {
        if self.text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }

        let length = self.text.chars().count();
        if length > MAX_TEXT_LENGTH {
            return Err(TtsError::InvalidRequest(format!(
                "text is {} characters, the limit is {}",
                length, MAX_TEXT_LENGTH
            )));
        }

        match self.voice.as_deref().map(str::trim) {
            None | Some("") => Ok(default_voice),
            Some(voice) => voice.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_request_full_deserialization() {
        let json = r#"{"text": "Hello world", "voice": "shimmer"}"#;
        let req: ConvertRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.text, "Hello world");
        assert_eq!(req.validate(Voice::Alloy).unwrap(), Voice::Shimmer);
    }

    #[test]
    fn test_convert_request_default_voice() {
        let req: ConvertRequest = serde_json::from_str(r#"{"text": "Hello"}"#).unwrap();
        assert!(req.voice.is_none());
        assert_eq!(req.validate(Voice::Onyx).unwrap(), Voice::Onyx);
    }

    #[test]
    fn test_convert_request_rejects_blank_text() {
        let req: ConvertRequest = serde_json::from_str(r#"{"text": "  \n"}"#).unwrap();
        assert!(matches!(req.validate(Voice::Alloy), Err(TtsError::EmptyText)));
    }

    #[test]
    fn test_convert_request_rejects_unknown_voice() {
        let req: ConvertRequest =
            serde_json::from_str(r#"{"text": "Hi", "voice": "bf_lily"}"#).unwrap();
        assert!(matches!(
            req.validate(Voice::Alloy),
            Err(TtsError::UnknownVoice(_))
        ));
    }

    #[test]
    fn test_convert_request_rejects_oversized_text() {
        let req = ConvertRequest {
            text: "a".repeat(MAX_TEXT_LENGTH + 1),
            voice: None,
        };
        assert!(matches!(
            req.validate(Voice::Alloy),
            Err(TtsError::InvalidRequest(_))
        ));
    }
}
