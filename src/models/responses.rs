use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::audio::AudioFormat;
use crate::config::Voice;
use crate::session::RunReport;

/// One chunk's audio, base64 encoded
#[derive(Debug, Serialize)]
pub struct AudioChunk {
    pub index: usize,
    pub data: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct ChunkFailureInfo {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    pub run_id: String,
    pub audio_chunks: Vec<AudioChunk>,
    pub total_chunks: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ChunkFailureInfo>,
}

impl ConvertResponse {
    pub fn from_report(report: &RunReport, format: AudioFormat) -> Self {
        let audio_chunks: Vec<AudioChunk> = report
            .sequence
            .results()
            .iter()
            .filter_map(|r| {
                r.audio().filter(|a| !a.is_empty()).map(|audio| AudioChunk {
                    index: r.index,
                    data: STANDARD.encode(audio),
                    content_type: format.content_type().to_string(),
                })
            })
            .collect();

        let (message, failures) = match report.report() {
            Ok(()) => ("Audio conversion completed".to_string(), Vec::new()),
            Err(failure) => {
                let infos = failure
                    .lines()
                    .into_iter()
                    .zip(failure.failures.iter())
                    .map(|(line, f)| ChunkFailureInfo {
                        index: f.index,
                        error: line,
                    })
                    .collect();
                (failure.to_string(), infos)
            }
        };

        Self {
            success: failures.is_empty(),
            message,
            run_id: report.run_id.to_string(),
            audio_chunks,
            total_chunks: report.total_chunks(),
            failures,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<Voice> for VoiceInfo {
    fn from(voice: Voice) -> Self {
        let config = voice.config();
        Self {
            id: config.id.to_string(),
            name: config.name.to_string(),
            description: config.description.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceInfo>,
    pub default: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunk;
    use crate::dispatcher::ChunkResult;
    use crate::error::RemoteError;
    use crate::sequencer::Sequence;
    use bytes::Bytes;
    use std::time::Duration;
    use uuid::Uuid;

    fn report(results: Vec<ChunkResult>) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            chunks: (0..results.len()).map(|i| TextChunk::new(i, "x")).collect(),
            sequence: Sequence::from_results(results),
            elapsed: Duration::from_millis(5),
            playback: None,
        }
    }

    #[test]
    fn test_convert_response_encodes_chunks() {
        let report = report(vec![
            ChunkResult::success(0, Bytes::from_static(b"hi")),
            ChunkResult::success(1, Bytes::from_static(b"yo")),
        ]);
        let response = ConvertResponse::from_report(&report, AudioFormat::Mp3);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["total_chunks"], 2);
        assert_eq!(json["audio_chunks"][0]["data"], "aGk=");
        assert_eq!(json["audio_chunks"][1]["type"], "audio/mpeg");
        assert!(json.get("failures").is_none());
    }

    #[test]
    fn test_convert_response_lists_failures() {
        let report = report(vec![
            ChunkResult::success(0, Bytes::from_static(b"hi")),
            ChunkResult::failure(1, RemoteError::Timeout),
        ]);
        let response = ConvertResponse::from_report(&report, AudioFormat::Mp3);

        assert!(!response.success);
        assert_eq!(response.audio_chunks.len(), 1);
        assert_eq!(response.failures[0].index, 1);
        assert_eq!(
            response.failures[0].error,
            "chunk 2 of 2 failed: request timed out"
        );
    }

    #[test]
    fn test_voice_info_serialization() {
        let json = serde_json::to_string(&VoiceInfo::from(Voice::Nova)).unwrap();
        assert!(json.contains("\"id\":\"nova\""));
        assert!(json.contains("\"name\":\"Nova\""));
    }
}
