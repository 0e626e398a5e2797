use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::audio::{self, AudioFormat};
use crate::dispatcher::ChunkResult;
use crate::error::{AggregateFailure, ChunkFailure, Result, TtsError};
use crate::playback::AudioSink;

/// What a playback pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub played: usize,
    pub skipped: usize,
}

/// Chunk results laid out by index, ready to be played or joined
///
/// Failed chunks are skipped during playback and concatenation; the gap is
/// logged and every failure shows up in [`Sequence::report`].
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    results: Vec<ChunkResult>,
}

impl Sequence {
    pub fn from_results(mut results: Vec<ChunkResult>) -> Self {
        results.sort_by_key(|r| r.index);
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[ChunkResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ChunkResult> {
        self.results
    }

    /// True when every chunk produced audio
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(ChunkResult::is_success)
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> Vec<ChunkFailure> {
        self.results
            .iter()
            .filter_map(|r| {
                r.error().map(|reason| ChunkFailure {
                    index: r.index,
                    reason: reason.clone(),
                })
            })
            .collect()
    }

    /// `Ok` if nothing failed, otherwise every failed position
    pub fn report(&self) -> std::result::Result<(), AggregateFailure> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateFailure {
                total: self.len(),
                failures,
            })
        }
    }

    /// Audio of every successful chunk, in index order
    pub fn audio_parts(&self) -> Vec<Bytes> {
        let total = self.len();
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                Ok(audio) if audio.is_empty() => None,
                Ok(audio) => Some(audio.clone()),
                Err(_) => {
                    tracing::warn!("Skipping chunk {} of {}", r.index + 1, total);
                    None
                }
            })
            .collect()
    }

    /// Join the successful chunks into a single artifact
    pub fn concatenate(&self, format: AudioFormat) -> Result<Bytes> {
        let parts = self.audio_parts();
        if parts.is_empty() {
            return match self.report() {
                Err(failure) => Err(TtsError::Aggregate(failure)),
                Ok(()) => Err(TtsError::EmptyText),
            };
        }
        audio::concatenate(format, &parts)
    }

    /// Feed the sink in index order, stopping between chunks on cancellation
    pub async fn play(
        &self,
        sink: &mut dyn AudioSink,
        cancel: &CancellationToken,
    ) -> Result<PlaybackSummary> {
        let total = self.len();
        let mut summary = PlaybackSummary::default();

        for result in &self.results {
            if cancel.is_cancelled() {
                tracing::info!("Playback stopped before chunk {} of {}", result.index + 1, total);
                return Err(TtsError::Cancelled);
            }

            match &result.outcome {
                Ok(audio) if audio.is_empty() => {}
                Ok(audio) => {
                    tracing::debug!("Playing chunk {} of {}", result.index + 1, total);
                    sink.play(result.index, total, audio).await?;
                    summary.played += 1;
                }
                Err(reason) => {
                    tracing::warn!(
                        "Skipping chunk {} of {}: {}",
                        result.index + 1,
                        total,
                        reason
                    );
                    sink.gap(result.index, total).await?;
                    summary.skipped += 1;
                }
            }
        }

        sink.finish().await?;
        Ok(summary)
    }

    /// Replace entries with retried results for the same indices
    pub fn merge(&mut self, retried: Vec<ChunkResult>) {
        for result in retried {
            match self.results.iter_mut().find(|r| r.index == result.index) {
                Some(slot) => *slot = result,
                None => {
                    tracing::warn!("Retried chunk {} is not part of this run", result.index + 1);
                }
            }
        }
    }
}
