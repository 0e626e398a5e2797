use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};
use tokio_util::sync::CancellationToken;

use crate::chunking::TextChunk;
use crate::config::Voice;
use crate::error::{RemoteError, Result, TtsError};
use crate::synthesis::Synthesizer;

/// Outcome of one chunk's synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub outcome: std::result::Result<Bytes, RemoteError>,
}

impl ChunkResult {
    pub fn success(index: usize, audio: Bytes) -> Self {
        Self {
            index,
            outcome: Ok(audio),
        }
    }

    pub fn failure(index: usize, error: RemoteError) -> Self {
        Self {
            index,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn audio(&self) -> Option<&Bytes> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&RemoteError> {
        self.outcome.as_ref().err()
    }
}

/// Index-keyed, write-once collection filled by concurrently finishing workers
pub struct ResultBoard {
    expected: Vec<usize>,
    slots: DashMap<usize, ChunkResult>,
}

impl ResultBoard {
    /// Board expecting exactly one result for each of `expected`
    pub fn new(mut expected: Vec<usize>) -> Self {
        expected.sort_unstable();
        expected.dedup();
        let slots = DashMap::with_capacity(expected.len());
        Self { expected, slots }
    }

    /// Store a result; returns false (and keeps the first) if the index was already written
    pub fn record(&self, result: ChunkResult) -> bool {
        if self.expected.binary_search(&result.index).is_err() {
            tracing::warn!("Result for unexpected chunk {} ignored", result.index);
            return false;
        }
        match self.slots.entry(result.index) {
            Entry::Occupied(_) => {
                tracing::warn!("Duplicate result for chunk {} ignored", result.index);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(result);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Take every result out in index order, filling any gap with a failure
    pub fn drain_ordered(&self) -> Vec<ChunkResult> {
        self.expected
            .iter()
            .map(|&index| match self.slots.remove(&index) {
                Some((_, result)) => result,
                None => ChunkResult::failure(
                    index,
                    RemoteError::Worker("worker exited without a result".to_string()),
                ),
            })
            .collect()
    }
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Marks one synthesis call as in flight for as long as it lives
struct InFlightGuard(Arc<Counters>);

impl InFlightGuard {
    fn enter(counters: &Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Statistics about the dispatcher
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchStats {
    pub max_workers: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub available_workers: usize,
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Runs synthesis calls with at most `max_workers` in flight at once.
///
/// The bound is shared by every dispatch made through the same instance.
pub struct Dispatcher {
    max_workers: usize,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(TtsError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            max_workers,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            max_workers: self.max_workers,
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::SeqCst),
            available_workers: self.semaphore.available_permits(),
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Synthesize every chunk and wait until all of them have settled.
    ///
    /// Returns one result per chunk, in index order. Individual failures are
    /// inside the results; only cancellation fails the whole call.
    pub async fn dispatch(
        &self,
        chunks: &[TextChunk],
        synthesizer: Arc<dyn Synthesizer>,
        voice: Voice,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChunkResult>> {
        self.submit(chunks, synthesizer, voice, cancel)
            .await?
            .settle(cancel)
            .await
    }

    /// Start a worker for every chunk, in index order.
    ///
    /// Each worker takes a permit before it is spawned, so this returns once
    /// the last chunk has a slot. Cancellation stops submission and aborts
    /// everything already started.
    pub async fn submit(
        &self,
        chunks: &[TextChunk],
        synthesizer: Arc<dyn Synthesizer>,
        voice: Voice,
        cancel: &CancellationToken,
    ) -> Result<InFlight> {
        let total = chunks.len();
        let mut in_flight = InFlight::new(
            chunks.iter().map(TextChunk::index).collect(),
            self.counters.clone(),
        );

        for chunk in chunks {
            // Whitespace-only remainders settle at once; there is nothing to speak
            if chunk.text().trim().is_empty() {
                tracing::debug!("Chunk {}/{} is blank, not sent", chunk.index() + 1, total);
                in_flight
                    .board
                    .record(ChunkResult::success(chunk.index(), Bytes::new()));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = self.semaphore.clone().acquire_owned() => Some(permit),
            };

            let permit = match permit {
                None => {
                    tracing::info!(
                        "Cancelled after submitting {} of {} chunks",
                        in_flight.abort_handles.len(),
                        total
                    );
                    in_flight.abort();
                    return Err(TtsError::Cancelled);
                }
                Some(permit) => permit.map_err(|e| {
                    TtsError::Unknown(format!("Failed to acquire worker slot: {}", e))
                })?,
            };

            let index = chunk.index();
            let text = chunk.text().to_string();
            let synthesizer = synthesizer.clone();
            let board = in_flight.board.clone();
            let counters = self.counters.clone();

            self.counters.submitted.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Submitting chunk {}/{} ({} chars)", index + 1, total, chunk.char_len());

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = {
                    let _guard = InFlightGuard::enter(&counters);
                    synthesizer.synthesize(&text, voice).await
                };

                counters.completed.fetch_add(1, Ordering::SeqCst);
                match &outcome {
                    Ok(audio) => {
                        tracing::info!("Chunk {}/{} processed ({} bytes)", index + 1, total, audio.len());
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::SeqCst);
                        tracing::warn!("Error processing chunk {}/{}: {}", index + 1, total, e);
                    }
                }

                board.record(ChunkResult { index, outcome });
            });

            in_flight.push(index, handle);
        }

        Ok(in_flight)
    }
}

type Joined = (usize, std::result::Result<(), JoinError>);

/// Workers that have been started but not yet collected
///
/// Dropping it aborts whatever is still running.
pub struct InFlight {
    total: usize,
    board: Arc<ResultBoard>,
    counters: Arc<Counters>,
    abort_handles: Vec<AbortHandle>,
    pending: FuturesUnordered<BoxFuture<'static, Joined>>,
}

impl InFlight {
    fn new(indices: Vec<usize>, counters: Arc<Counters>) -> Self {
        let total = indices.len();
        Self {
            total,
            board: Arc::new(ResultBoard::new(indices)),
            counters,
            abort_handles: Vec::with_capacity(total),
            pending: FuturesUnordered::new(),
        }
    }

    fn push(&mut self, index: usize, handle: tokio::task::JoinHandle<()>) {
        self.abort_handles.push(handle.abort_handle());
        self.pending
            .push(handle.map(move |joined| (index, joined)).boxed());
    }

    pub fn len(&self) -> usize {
        self.abort_handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abort_handles.is_empty()
    }

    /// Wait for every worker to settle and return results in index order
    pub async fn settle(mut self, cancel: &CancellationToken) -> Result<Vec<ChunkResult>> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = self.pending.next() => Some(next),
            };

            match next {
                None => {
                    tracing::info!(
                        "Cancelled with {} of {} chunks settled; discarding results",
                        self.board.len(),
                        self.total
                    );
                    self.abort();
                    return Err(TtsError::Cancelled);
                }
                Some(None) => break,
                Some(Some((_, Ok(())))) => {}
                Some(Some((index, Err(e)))) => {
                    tracing::error!("Worker for chunk {} died: {}", index + 1, e);
                    self.counters.completed.fetch_add(1, Ordering::SeqCst);
                    self.counters.failed.fetch_add(1, Ordering::SeqCst);
                    self.board
                        .record(ChunkResult::failure(index, RemoteError::Worker(e.to_string())));
                }
            }
        }

        Ok(self.board.drain_ordered())
    }

    fn abort(&self) {
        for handle in &self.abort_handles {
            handle.abort();
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.abort();
    }
}
