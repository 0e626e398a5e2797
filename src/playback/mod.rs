pub mod file_sink;
#[cfg(feature = "playback")]
pub mod device;

pub use file_sink::FileSink;
#[cfg(feature = "playback")]
pub use device::RodioSink;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Destination for chunk audio, fed strictly in index order
#[async_trait]
pub trait AudioSink: Send {
    /// Consume one chunk's audio; `index` is 0-based, `total` the run's chunk count
    async fn play(&mut self, index: usize, total: usize, audio: &Bytes) -> Result<()>;

    /// Called in place of `play` for a chunk that failed
    async fn gap(&mut self, _index: usize, _total: usize) -> Result<()> {
        Ok(())
    }

    /// Called once after the last chunk
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fans every call out to several sinks in turn
#[derive(Default)]
pub struct SinkChain {
    sinks: Vec<Box<dyn AudioSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, sink: impl AudioSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AudioSink for SinkChain {
    async fn play(&mut self, index: usize, total: usize, audio: &Bytes) -> Result<()> {
        for sink in &mut self.sinks {
            sink.play(index, total, audio).await?;
        }
        Ok(())
    }

    async fn gap(&mut self, index: usize, total: usize) -> Result<()> {
        for sink in &mut self.sinks {
            sink.gap(index, total).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.finish().await?;
        }
        Ok(())
    }
}
