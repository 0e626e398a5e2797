use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::AudioSink;
use crate::error::{Result, TtsError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An open output device: the stream lives on its own thread, the sink is shared
struct Output {
    sink: Arc<rodio::Sink>,
    // Dropping this lets the device thread close the stream
    _release: mpsc::Sender<()>,
}

fn open_output() -> Result<Output> {
    let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<Arc<rodio::Sink>, String>>();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    std::thread::Builder::new()
        .name("audio-output".to_string())
        .spawn(move || {
            let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("no output device: {}", e)));
                    return;
                }
            };
            let sink = Arc::new(rodio::Sink::connect_new(stream.mixer()));
            if ready_tx.send(Ok(sink)).is_ok() {
                // Blocks until the owning RodioSink is dropped
                let _ = release_rx.recv();
            }
            drop(stream);
        })?;

    let sink = ready_rx
        .recv()
        .map_err(|_| TtsError::Playback("audio output thread exited".to_string()))?
        .map_err(TtsError::Playback)?;

    Ok(Output {
        sink,
        _release: release_tx,
    })
}

/// Wait until everything queued has played, stopping early on cancellation
fn drain(sink: &rodio::Sink, cancel: &CancellationToken) {
    while !sink.empty() {
        if cancel.is_cancelled() {
            sink.stop();
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Plays chunks back to back on the default output device
///
/// The device is opened on the first chunk and kept for the whole run, so
/// consecutive chunks are queued on one sink without gaps. `finish` waits for
/// the queue to drain. Stopping the token cuts playback short.
pub struct RodioSink {
    cancel: CancellationToken,
    output: Option<Output>,
}

impl RodioSink {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            output: None,
        }
    }

    async fn sink(&mut self) -> Result<Arc<rodio::Sink>> {
        if let Some(output) = &self.output {
            return Ok(output.sink.clone());
        }
        let output = tokio::task::spawn_blocking(open_output).await??;
        let sink = output.sink.clone();
        self.output = Some(output);
        Ok(sink)
    }
}

#[async_trait]
impl AudioSink for RodioSink {
    async fn play(&mut self, index: usize, total: usize, audio: &Bytes) -> Result<()> {
        let sink = self.sink().await?;
        let audio = audio.clone();

        tokio::task::spawn_blocking(move || {
            let source = rodio::Decoder::new(Cursor::new(audio))
                .map_err(|e| TtsError::Playback(format!("cannot decode audio: {}", e)))?;
            sink.append(source);
            Ok::<(), TtsError>(())
        })
        .await??;

        tracing::info!("Queued chunk {} of {} for playback", index + 1, total);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        let Some(output) = &self.output else {
            return Ok(());
        };
        let sink = output.sink.clone();
        let cancel = self.cancel.clone();

        tokio::task::spawn_blocking(move || drain(&sink, &cancel)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finish_without_audio_leaves_device_closed() {
        let mut sink = RodioSink::new(CancellationToken::new());
        sink.finish().await.unwrap();
        assert!(sink.output.is_none());
    }
}
