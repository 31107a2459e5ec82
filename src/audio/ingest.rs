//! Audio ingestion: channel reduction, on-disk persistence, and reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::buffer::AudioBuffer;
use crate::audio::codec::AudioCodec;
use crate::audio::wav;
use crate::defaults;
use crate::error::Result;

/// A compressed copy of ingested audio on disk.
///
/// The file belongs to the caller once materialized; nothing in the
/// pipeline deletes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAudio {
    path: PathBuf,
}

impl PersistedAudio {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Prepares audio for the model stages and persists it for later reloads.
pub struct AudioIngestor {
    codec: Arc<dyn AudioCodec>,
}

impl AudioIngestor {
    pub fn new(codec: Arc<dyn AudioCodec>) -> Self {
        Self { codec }
    }

    /// Reduce input audio to mono by keeping only the first channel.
    pub fn ingest(&self, input: AudioBuffer) -> AudioBuffer {
        input.first_channel()
    }

    /// Write `audio` to `dest` in the compressed format `dest`'s extension
    /// implies.
    ///
    /// The samples go through an intermediate WAV file that is removed
    /// before this returns, whether or not the conversion succeeded.
    pub fn materialize(&self, audio: &AudioBuffer, dest: &Path) -> Result<PersistedAudio> {
        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let temp = tempfile::Builder::new()
            .prefix("voxalign-")
            .suffix(".wav")
            .tempfile()?;

        wav::write_wav(temp.path(), audio)?;
        self.codec.convert(temp.path(), dest)?;

        if let Err(e) = temp.close() {
            log::warn!("failed to remove intermediate file: {}", e);
        }

        Ok(PersistedAudio::new(dest))
    }

    /// Decode a persisted copy back into a mono buffer at the pipeline
    /// sample rate.
    pub fn load(&self, persisted: &PersistedAudio) -> Result<AudioBuffer> {
        let samples = self
            .codec
            .decode_pcm(persisted.path(), defaults::SAMPLE_RATE)?;
        AudioBuffer::mono(samples, defaults::SAMPLE_RATE)
    }
}
