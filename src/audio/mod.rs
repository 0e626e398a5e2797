pub mod format;
pub mod wav_utils;

pub use format::AudioFormat;

use bytes::{Bytes, BytesMut};

use crate::error::{Result, TtsError};

/// Join chunk audio into one artifact, in the order given.
///
/// Frame-based formats (mp3, aac, opus, flac, raw pcm) are appended byte for
/// byte; WAV files are merged at the sample level so the result has a single
/// valid header.
pub fn concatenate(format: AudioFormat, parts: &[Bytes]) -> Result<Bytes> {
    if parts.is_empty() {
        return Err(TtsError::WavConcatenation(
            "No audio files to concatenate".to_string(),
        ));
    }

    if format == AudioFormat::Wav {
        return wav_utils::concatenate(parts);
    }

    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut combined = BytesMut::with_capacity(total);
    for part in parts {
        combined.extend_from_slice(part);
    }
    Ok(combined.freeze())
}
