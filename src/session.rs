use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::chunking::{chunk_text, TextChunk};
use crate::config::{Config, Voice};
use crate::dispatcher::Dispatcher;
use crate::error::{AggregateFailure, Result, TtsError};
use crate::playback::AudioSink;
use crate::sequencer::{PlaybackSummary, Sequence};
use crate::synthesis::{HttpSynthesizer, Synthesizer};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Chunking,
    Dispatching,
    Awaiting,
    Playing,
    Reporting,
}

/// What to do when some chunks fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Play every chunk that succeeded, leave gaps for the rest
    #[default]
    SkipFailed,
    /// Play nothing unless every chunk succeeded
    AbortOnFailure,
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub chunks: Vec<TextChunk>,
    pub sequence: Sequence,
    pub elapsed: Duration,
    pub playback: Option<PlaybackSummary>,
}

impl RunReport {
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn report(&self) -> std::result::Result<(), AggregateFailure> {
        self.sequence.report()
    }
}

/// Resets the published state to `Idle` however the run ends
struct StateGuard<'a>(&'a watch::Sender<RunState>);

impl StateGuard<'_> {
    fn set(&self, state: RunState) {
        tracing::debug!("Run state -> {:?}", state);
        self.0.send_replace(state);
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(RunState::Idle);
    }
}

/// Ties chunking, dispatch and playback together for one document at a time
pub struct Session {
    config: Config,
    synthesizer: Arc<dyn Synthesizer>,
    dispatcher: Arc<Dispatcher>,
    state: watch::Sender<RunState>,
    run_lock: Mutex<()>,
    cancel: StdMutex<CancellationToken>,
}

impl Session {
    /// Session talking to the configured HTTP endpoint
    pub fn new(config: Config) -> Result<Self> {
        let synthesizer = Arc::new(HttpSynthesizer::new(&config)?);
        Self::with_synthesizer(config, synthesizer)
    }

    pub fn with_synthesizer(config: Config, synthesizer: Arc<dyn Synthesizer>) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::new(config.max_workers)?);
        Self::with_dispatcher(config, synthesizer, dispatcher)
    }

    /// Session sharing a dispatcher (and its concurrency bound) with others
    pub fn with_dispatcher(
        config: Config,
        synthesizer: Arc<dyn Synthesizer>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(RunState::Idle);

        Ok(Self {
            config,
            synthesizer,
            dispatcher,
            state,
            run_lock: Mutex::new(()),
            cancel: StdMutex::new(CancellationToken::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Cancel the current run, if any; the session goes back to `Idle`
    pub fn stop(&self) {
        let state = self.state();
        if state == RunState::Idle {
            tracing::debug!("Stop requested while idle");
            return;
        }
        tracing::info!("Stop requested while {:?}", state);
        self.current_token().cancel();
    }

    /// Chunk and synthesize `text`, returning every result in order
    pub async fn synthesize(&self, text: &str, voice: Voice) -> Result<RunReport> {
        let _run = self.run_lock.try_lock().map_err(|_| TtsError::Busy)?;
        let cancel = self.begin_run();
        let run_id = Uuid::new_v4();

        async {
            let guard = StateGuard(&self.state);
            self.fetch(run_id, text, voice, &guard, &cancel).await
        }
        .instrument(tracing::info_span!("run", %run_id))
        .await
    }

    /// Synthesize `text` and feed the results to `sink` in order
    ///
    /// Under [`FailurePolicy::AbortOnFailure`] a run with failed chunks plays
    /// nothing and comes back with `playback: None`; the report still holds
    /// the audio that did arrive, ready for [`Session::retry_failed`].
    pub async fn convert_and_play(
        &self,
        text: &str,
        voice: Voice,
        sink: &mut dyn AudioSink,
        policy: FailurePolicy,
    ) -> Result<RunReport> {
        let _run = self.run_lock.try_lock().map_err(|_| TtsError::Busy)?;
        let cancel = self.begin_run();
        let run_id = Uuid::new_v4();

        async {
            let guard = StateGuard(&self.state);
            let mut report = self.fetch(run_id, text, voice, &guard, &cancel).await?;

            if policy == FailurePolicy::AbortOnFailure {
                if let Err(failure) = report.report() {
                    guard.set(RunState::Reporting);
                    tracing::error!("Not playing: {}", failure);
                    return Ok(report);
                }
            }

            guard.set(RunState::Playing);
            let summary = report.sequence.play(sink, &cancel).await?;
            report.playback = Some(summary);

            guard.set(RunState::Reporting);
            log_outcome(&report);
            Ok(report)
        }
        .instrument(tracing::info_span!("run", %run_id))
        .await
    }

    /// Resubmit only the chunks that failed in `report` and merge the new results
    pub async fn retry_failed(&self, report: &mut RunReport, voice: Voice) -> Result<()> {
        let failed = match report.report() {
            Ok(()) => return Ok(()),
            Err(failure) => failure.failed_indices(),
        };

        let _run = self.run_lock.try_lock().map_err(|_| TtsError::Busy)?;
        let cancel = self.begin_run();
        let run_id = report.run_id;

        async {
            let guard = StateGuard(&self.state);
            let chunks: Vec<TextChunk> = report
                .chunks
                .iter()
                .filter(|c| failed.contains(&c.index()))
                .cloned()
                .collect();
            tracing::info!("Retrying {} of {} chunks", chunks.len(), report.total_chunks());

            let started = Instant::now();
            let results = self.dispatch(&chunks, voice, &guard, &cancel).await?;
            report.sequence.merge(results);
            report.elapsed += started.elapsed();

            guard.set(RunState::Reporting);
            log_outcome(report);
            Ok(())
        }
        .instrument(tracing::info_span!("retry", %run_id))
        .await
    }

    fn begin_run(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        *current = token.clone();
        token
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn fetch(
        &self,
        run_id: Uuid,
        text: &str,
        voice: Voice,
        guard: &StateGuard<'_>,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let started = Instant::now();

        guard.set(RunState::Chunking);
        let chunks = if text.trim().is_empty() {
            Vec::new()
        } else {
            chunk_text(text, &self.config.chunking())?
        };
        tracing::info!(
            "Split {} chars into {} chunks (max {} chars, voice {})",
            text.chars().count(),
            chunks.len(),
            self.config.max_chars,
            voice
        );

        let results = if chunks.is_empty() {
            Vec::new()
        } else {
            self.dispatch(&chunks, voice, guard, cancel).await?
        };

        Ok(RunReport {
            run_id,
            chunks,
            sequence: Sequence::from_results(results),
            elapsed: started.elapsed(),
            playback: None,
        })
    }

    async fn dispatch(
        &self,
        chunks: &[TextChunk],
        voice: Voice,
        guard: &StateGuard<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<crate::dispatcher::ChunkResult>> {
        guard.set(RunState::Dispatching);
        let in_flight = self
            .dispatcher
            .submit(chunks, self.synthesizer.clone(), voice, cancel)
            .await?;

        guard.set(RunState::Awaiting);
        in_flight.settle(cancel).await
    }
}

fn log_outcome(report: &RunReport) {
    match report.report() {
        Ok(()) => tracing::info!(
            "All {} chunks succeeded in {:?}",
            report.total_chunks(),
            report.elapsed
        ),
        Err(failure) => {
            for line in failure.lines() {
                tracing::warn!("{}", line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ENDPOINT: &str = "https://api.example.com/v1/audio/speech";

    /// Fails every chunk containing "bad" until `healed` is set
    #[derive(Default)]
    struct Flaky {
        calls: AtomicUsize,
        healed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Synthesizer for Flaky {
        async fn synthesize(
            &self,
            text: &str,
            _voice: Voice,
        ) -> std::result::Result<Bytes, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("bad") && !self.healed.load(Ordering::SeqCst) {
                return Err(RemoteError::Status {
                    status: 500,
                    message: "server error".to_string(),
                });
            }
            Ok(Bytes::from(text.trim().to_string()))
        }
    }

    fn session(synth: Arc<Flaky>) -> Session {
        let config = Config::new(ENDPOINT, "secret-key-123456")
            .unwrap()
            .with_max_chars(10);
        Session::with_synthesizer(config, synth).unwrap()
    }

    #[tokio::test]
    async fn test_whitespace_only_text_makes_no_calls() {
        let synth = Arc::new(Flaky::default());
        let session = session(synth.clone());

        let report = session.synthesize("   \n ", Voice::Alloy).await.unwrap();
        assert_eq!(report.total_chunks(), 0);
        assert!(report.sequence.is_empty());
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_retry_failed_only_resubmits_failures() {
        let synth = Arc::new(Flaky::default());
        let session = session(synth.clone());

        let mut report = session
            .synthesize("Good one. bad two. Good six.", Voice::Alloy)
            .await
            .unwrap();
        let failure = report.report().unwrap_err();
        assert_eq!(failure.failed_indices(), vec![1]);
        let first_calls = synth.calls.load(Ordering::SeqCst);
        assert_eq!(first_calls, report.total_chunks());

        synth.healed.store(true, Ordering::SeqCst);
        session.retry_failed(&mut report, Voice::Alloy).await.unwrap();

        assert!(report.sequence.is_complete());
        assert_eq!(synth.calls.load(Ordering::SeqCst), first_calls + 1);
    }

    #[tokio::test]
    async fn test_abort_policy_plays_nothing() {
        let synth = Arc::new(Flaky::default());
        let session = session(synth);
        let dir = tempfile::TempDir::new().unwrap();
        let mut sink = crate::playback::FileSink::new(
            dir.path(),
            "out",
            crate::audio::AudioFormat::Mp3,
        );

        let report = session
            .convert_and_play("Fine now. bad one.", Voice::Alloy, &mut sink, FailurePolicy::AbortOnFailure)
            .await
            .unwrap();

        assert!(report.playback.is_none());
        assert_eq!(report.report().unwrap_err().failed_indices(), vec![1]);
        assert!(sink.written().is_empty());
        assert_eq!(session.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_aborted_run_can_be_retried() {
        let synth = Arc::new(Flaky::default());
        let session = session(synth.clone());
        let dir = tempfile::TempDir::new().unwrap();
        let mut sink = crate::playback::FileSink::new(
            dir.path(),
            "out",
            crate::audio::AudioFormat::Mp3,
        );

        let mut report = session
            .convert_and_play("Fine now. bad one.", Voice::Alloy, &mut sink, FailurePolicy::AbortOnFailure)
            .await
            .unwrap();
        let calls = synth.calls.load(Ordering::SeqCst);

        synth.healed.store(true, Ordering::SeqCst);
        session.retry_failed(&mut report, Voice::Alloy).await.unwrap();

        assert!(report.sequence.is_complete());
        assert_eq!(synth.calls.load(Ordering::SeqCst), calls + 1);
        assert!(report.sequence.results()[0].audio().is_some());
    }

    #[tokio::test]
    async fn test_stop_while_idle_does_not_poison_next_run() {
        let synth = Arc::new(Flaky::default());
        let session = session(synth);
        session.stop();

        let report = session.synthesize("Hello.", Voice::Alloy).await.unwrap();
        assert!(report.sequence.is_complete());
    }
}
