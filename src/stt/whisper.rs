//! Whisper-based recognition backend.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be
//! installed. To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use std::path::{Path, PathBuf};

use crate::config::{ComputeType, Device};
use crate::error::{Result, VoxalignError};
use crate::models::catalog;
use crate::stt::backend::{AsrBackend, AsrProvider};

#[cfg(feature = "whisper")]
use crate::stt::backend::BatchTranscription;
#[cfg(feature = "whisper")]
use crate::transcript::Segment;
#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Loads Whisper models from a root directory.
#[derive(Debug, Clone)]
pub struct WhisperAsrProvider {
    model_root: PathBuf,
    threads: Option<usize>,
}

impl WhisperAsrProvider {
    pub fn new(model_root: &Path) -> Self {
        Self {
            model_root: model_root.to_path_buf(),
            threads: None,
        }
    }

    /// Set an explicit inference thread count (None lets whisper decide).
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn threads(&self) -> Option<usize> {
        self.threads
    }

    /// Resolve a model name to its ggml file under the model root.
    ///
    /// int8 precision prefers the `-q8_0` quantized file when present and
    /// falls back to the plain file; other precisions go straight to the
    /// plain file, which stores weights at their trained precision.
    pub fn resolve_model_path(&self, model: &str, compute_type: ComputeType) -> Result<PathBuf> {
        if compute_type == ComputeType::Int8 {
            let quantized = self.model_root.join(catalog::ggml_file_name_quantized(model));
            if quantized.exists() {
                return Ok(quantized);
            }
        }

        let plain = self.model_root.join(catalog::ggml_file_name(model));
        if plain.exists() {
            return Ok(plain);
        }

        Err(VoxalignError::ModelNotFound {
            path: plain.to_string_lossy().to_string(),
        })
    }
}

#[cfg(feature = "whisper")]
impl AsrProvider for WhisperAsrProvider {
    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: ComputeType,
    ) -> Result<Box<dyn AsrBackend>> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if device == Device::Cuda && !cfg!(feature = "cuda") {
            log::warn!("cuda requested but this build has no CUDA support; running on cpu");
        }

        let model_path = self.resolve_model_path(model, compute_type)?;
        log::debug!("loading recognition model from {}", model_path.display());

        let mut context_params = WhisperContextParameters::default();
        // Enable flash attention: uses fused attention kernels that avoid the
        // standalone softmax CUDA kernel, which crashes on Blackwell GPUs
        // (sm_120) with ggml <= 1.7.6
        context_params.flash_attn(true);

        let context = WhisperContext::new_with_params(
            model_path.to_str().ok_or_else(|| VoxalignError::ModelLoad {
                model: model.to_string(),
                message: "Invalid UTF-8 in model path".to_string(),
            })?,
            context_params,
        )
        .map_err(|e| VoxalignError::ModelLoad {
            model: model.to_string(),
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Box::new(WhisperAsrBackend {
            context: Mutex::new(context),
            model_name: model.to_string(),
            threads: self.threads,
        }))
    }
}

#[cfg(not(feature = "whisper"))]
impl AsrProvider for WhisperAsrProvider {
    fn load(
        &self,
        model: &str,
        _device: Device,
        _compute_type: ComputeType,
    ) -> Result<Box<dyn AsrBackend>> {
        Err(VoxalignError::ModelLoad {
            model: model.to_string(),
            message: concat!(
                "whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release --features full\n",
                "If the build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }
}

/// Whisper-backed recognition.
///
/// The WhisperContext is wrapped in a Mutex to ensure thread safety; every
/// window gets a fresh decoding state.
#[cfg(feature = "whisper")]
pub struct WhisperAsrBackend {
    context: Mutex<WhisperContext>,
    model_name: String,
    threads: Option<usize>,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperAsrBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperAsrBackend")
            .field("model_name", &self.model_name)
            .field("threads", &self.threads)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

#[cfg(feature = "whisper")]
impl WhisperAsrBackend {
    fn recognize_window(
        &self,
        context: &WhisperContext,
        window: &[f32],
        language: Option<&str>,
    ) -> Result<(Vec<Segment>, Option<String>)> {
        let mut state = context
            .create_state()
            .map_err(|e| VoxalignError::Inference {
                stage: "transcription".to_string(),
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        if let Some(threads) = self.threads {
            params.set_n_threads(threads as i32);
        }

        // Disable printing to stdout/stderr
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, window)
            .map_err(|e| VoxalignError::Inference {
                stage: "transcription".to_string(),
                message: format!("Whisper inference failed: {}", e),
            })?;

        let detected = if language.is_none() {
            let lang_id = state.full_lang_id_from_state();
            Some(whisper_rs::get_lang_str(lang_id).unwrap_or("").to_string())
        } else {
            None
        };

        let mut segments = Vec::new();
        for segment in state.as_iter() {
            let text = segment.to_string();
            if text.trim().is_empty() {
                continue;
            }
            // Segment timestamps are in 10ms ticks
            segments.push(Segment {
                start: segment.start_timestamp() as f32 / 100.0,
                end: segment.end_timestamp() as f32 / 100.0,
                text,
            });
        }

        Ok((segments, detected))
    }
}

#[cfg(feature = "whisper")]
impl AsrBackend for WhisperAsrBackend {
    fn transcribe_batch(
        &self,
        windows: &[&[f32]],
        language: Option<&str>,
    ) -> Result<BatchTranscription> {
        let context = self.context.lock().map_err(|e| VoxalignError::Inference {
            stage: "transcription".to_string(),
            message: format!("Failed to acquire context lock: {}", e),
        })?;

        let mut resolved = language.map(str::to_string);
        let mut out = Vec::with_capacity(windows.len());

        for window in windows {
            let (segments, detected) =
                self.recognize_window(&context, window, resolved.as_deref())?;
            if resolved.is_none() {
                resolved = detected;
            }
            out.push(segments);
        }

        Ok(BatchTranscription {
            windows: out,
            language: resolved.unwrap_or_default(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
