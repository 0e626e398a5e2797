use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::AudioSink;
use crate::audio::{self, AudioFormat};
use crate::error::Result;

/// Writes each chunk to `chunk_NNN.<ext>` and the joined audio to `<stem>.<ext>`
pub struct FileSink {
    dir: PathBuf,
    stem: String,
    format: AudioFormat,
    parts: Vec<Bytes>,
    written: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>, format: AudioFormat) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            format,
            parts: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every file written so far, chunk files first
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("chunk_{:03}.{}", index + 1, self.format.extension()))
    }

    pub fn combined_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.stem, self.format.extension()))
    }
}

#[async_trait]
impl AudioSink for FileSink {
    async fn play(&mut self, index: usize, total: usize, audio: &Bytes) -> Result<()> {
        if self.written.is_empty() {
            fs::create_dir_all(&self.dir).await?;
        }

        let path = self.chunk_path(index);
        fs::write(&path, audio).await?;
        tracing::debug!("Saved chunk {} of {} to {:?}", index + 1, total, path);

        self.parts.push(audio.clone());
        self.written.push(path);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.parts.is_empty() {
            tracing::warn!("No audio to save in {:?}", self.dir);
            return Ok(());
        }

        let combined = audio::concatenate(self.format, &self.parts)?;
        let path = self.combined_path();
        fs::write(&path, &combined).await?;
        tracing::info!("Saved {} bytes of audio to {:?}", combined.len(), path);

        self.parts.clear();
        self.written.push(path);
        Ok(())
    }
}
