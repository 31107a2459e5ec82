//! Chunked recognition over a loaded backend.

use crate::audio::buffer::AudioBuffer;
use crate::config::{ComputeType, Device};
use crate::defaults;
use crate::error::{Result, VoxalignError};
use crate::stt::backend::{AsrBackend, AsrProvider};
use crate::transcript::Segment;

/// Recognition result for a whole request.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOutput {
    /// Segments in audio order with absolute times.
    pub segments: Vec<Segment>,
    /// Resolved language: the requested one, or the detected one when the
    /// request said "auto".
    pub language: String,
}

/// Windows audio, batches the windows, and drives a recognition backend.
///
/// Holding the engine holds the loaded model; drop it to release the model.
pub struct TranscriptionEngine {
    backend: Box<dyn AsrBackend>,
}

impl TranscriptionEngine {
    /// Load a model through `provider` and wrap it for chunked recognition.
    pub fn load(
        provider: &dyn AsrProvider,
        model: &str,
        device: Device,
        compute_type: ComputeType,
    ) -> Result<Self> {
        let backend = provider.load(model, device, compute_type)?;
        log::info!(
            "loaded recognition model {} ({}, {})",
            backend.model_name(),
            device,
            compute_type
        );
        Ok(Self { backend })
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Recognize `audio` in fixed-length windows.
    ///
    /// Windows of `chunk_secs` are grouped into batches of `batch_size` and
    /// handed to the backend together. Under "auto" the first batch runs
    /// detection and later batches are pinned to the detected language.
    /// Segment times come back absolute; order follows window order and is
    /// never re-sorted.
    pub fn transcribe(
        &self,
        audio: &AudioBuffer,
        batch_size: u32,
        language: &str,
        chunk_secs: u32,
    ) -> Result<TranscriptionOutput> {
        if batch_size == 0 || chunk_secs == 0 {
            return Err(VoxalignError::Validation {
                field: if batch_size == 0 {
                    "batch_size".to_string()
                } else {
                    "chunk_size".to_string()
                },
                message: "must be positive".to_string(),
            });
        }

        let window_len = chunk_secs as usize * audio.sample_rate() as usize;
        let windows: Vec<&[f32]> = audio.samples().chunks(window_len).collect();

        let mut resolved: Option<String> = if language == defaults::AUTO_LANGUAGE {
            None
        } else {
            Some(language.to_string())
        };

        let mut segments = Vec::new();

        for (batch_idx, batch) in windows.chunks(batch_size as usize).enumerate() {
            let result = self.backend.transcribe_batch(batch, resolved.as_deref())?;

            if resolved.is_none() {
                log::info!("detected language: {}", result.language);
                resolved = Some(result.language.clone());
            }

            let base_window = batch_idx * batch_size as usize;
            for (offset_idx, window_segments) in result.windows.into_iter().enumerate() {
                let offset = ((base_window + offset_idx) * chunk_secs as usize) as f32;
                for segment in window_segments {
                    segments.push(Segment {
                        start: segment.start + offset,
                        end: segment.end + offset,
                        text: segment.text,
                    });
                }
            }
        }

        // Nothing to detect from empty audio: report the requested value.
        let language = resolved.unwrap_or_else(|| language.to_string());

        Ok(TranscriptionOutput { segments, language })
    }
}
