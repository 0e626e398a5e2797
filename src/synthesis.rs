use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Serialize;

use crate::audio::AudioFormat;
use crate::config::{ApiKey, Config, Voice};
use crate::error::{RemoteError, Result, TtsError};

/// Longest slice of an error body carried into a `RemoteError`
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Converts one text segment into audio bytes with a single remote call.
///
/// Implementations hold no per-call mutable state and must be safe to call
/// concurrently. There is no retry inside `synthesize`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> std::result::Result<Bytes, RemoteError>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: Voice,
    response_format: AudioFormat,
}

/// Client for OpenAI-compatible `/audio/speech` endpoints (OpenAI and Azure OpenAI)
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: Url,
    api_key: ApiKey,
    model: String,
    response_format: AudioFormat,
}

impl HttpSynthesizer {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("tts_relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TtsError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            response_format: config.response_format,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice: Voice) -> std::result::Result<Bytes, RemoteError> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: self.response_format,
        };

        // OpenAI reads the bearer token, Azure OpenAI reads `api-key`
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose())
            .header("api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        let audio = response.bytes().await?;

        if is_json {
            return Err(RemoteError::MalformedPayload(format!(
                "expected audio, got JSON: {}",
                error_message(&String::from_utf8_lossy(&audio))
            )));
        }

        if audio.is_empty() {
            return Err(RemoteError::EmptyPayload);
        }

        tracing::debug!(
            "Synthesized {} chars into {} bytes of {}",
            text.chars().count(),
            audio.len(),
            self.response_format
        );

        Ok(audio)
    }
}

/// Pull `error.message` out of an API error body, or fall back to the raw text
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = message.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", truncated)
    } else {
        message
    }
}
