//! wav2vec2 CTC alignment backend running on onnxruntime.
//!
//! # Feature Gate
//!
//! This module requires the `wav2vec2` feature to be enabled. To build with
//! alignment support:
//!
//! ```bash
//! cargo build --features wav2vec2
//! ```

use std::path::{Path, PathBuf};

use crate::align::backend::{AlignBackend, AlignProvider};
use crate::config::Device;
use crate::error::{Result, VoxalignError};
use crate::models::catalog;

#[cfg(feature = "wav2vec2")]
use crate::align::decode::{self, CtcVocab, Emissions};
#[cfg(feature = "wav2vec2")]
use crate::defaults;
#[cfg(feature = "wav2vec2")]
use crate::transcript::WordAlignment;
#[cfg(feature = "wav2vec2")]
use ndarray::Array2;
#[cfg(feature = "wav2vec2")]
use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
#[cfg(feature = "wav2vec2")]
use ort::inputs;
#[cfg(feature = "wav2vec2")]
use ort::session::Session;
#[cfg(feature = "wav2vec2")]
use ort::session::builder::GraphOptimizationLevel;
#[cfg(feature = "wav2vec2")]
use ort::value::TensorRef;
#[cfg(feature = "wav2vec2")]
use std::collections::HashMap;
#[cfg(feature = "wav2vec2")]
use std::sync::Mutex;

/// Loads per-language wav2vec2 alignment models from a root directory.
///
/// Each model lives in its own subdirectory holding `model.onnx` and
/// `vocab.json`.
#[derive(Debug, Clone)]
pub struct Wav2Vec2AlignProvider {
    model_root: PathBuf,
}

impl Wav2Vec2AlignProvider {
    pub fn new(model_root: &Path) -> Self {
        Self {
            model_root: model_root.to_path_buf(),
        }
    }

    /// Resolve the on-disk directory for a language's alignment model.
    pub fn resolve_model_dir(&self, language: &str) -> Result<PathBuf> {
        let info = catalog::align_model_for(language).ok_or_else(|| {
            VoxalignError::UnsupportedLanguage {
                language: language.to_string(),
            }
        })?;

        let dir = self.model_root.join(info.dir_name());
        let model_file = dir.join("model.onnx");
        if !model_file.exists() {
            return Err(VoxalignError::ModelNotFound {
                path: model_file.to_string_lossy().to_string(),
            });
        }

        Ok(dir)
    }
}

#[cfg(feature = "wav2vec2")]
impl AlignProvider for Wav2Vec2AlignProvider {
    fn load(&self, language: &str, device: Device) -> Result<Box<dyn AlignBackend>> {
        let info = catalog::align_model_for(language).ok_or_else(|| {
            VoxalignError::UnsupportedLanguage {
                language: language.to_string(),
            }
        })?;
        let dir = self.resolve_model_dir(language)?;

        if device == Device::Cuda && !cfg!(feature = "cuda") {
            log::warn!("cuda requested but this build has no CUDA support; running on cpu");
        }

        let vocab = load_vocab(&dir.join("vocab.json"), info.model_id)?;

        log::debug!("loading alignment model from {}", dir.display());
        let session = build_session(&dir.join("model.onnx"), device).map_err(|e| {
            VoxalignError::ModelLoad {
                model: info.model_id.to_string(),
                message: format!("Failed to load ONNX model: {}", e),
            }
        })?;

        Ok(Box::new(Wav2Vec2AlignBackend {
            session: Mutex::new(session),
            vocab,
            language: language.to_string(),
        }))
    }
}

#[cfg(not(feature = "wav2vec2"))]
impl AlignProvider for Wav2Vec2AlignProvider {
    fn load(&self, language: &str, _device: Device) -> Result<Box<dyn AlignBackend>> {
        let info = catalog::align_model_for(language).ok_or_else(|| {
            VoxalignError::UnsupportedLanguage {
                language: language.to_string(),
            }
        })?;

        Err(VoxalignError::ModelLoad {
            model: info.model_id.to_string(),
            message: concat!(
                "wav2vec2 feature not enabled. This binary was built without forced alignment.\n",
                "To fix: cargo build --release --features full"
            )
            .to_string(),
        })
    }
}

#[cfg(feature = "wav2vec2")]
fn build_session(path: &Path, device: Device) -> std::result::Result<Session, ort::Error> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(execution_providers(device))?
        .commit_from_file(path)
}

#[cfg(all(feature = "wav2vec2", feature = "cuda"))]
fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cuda => vec![
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ],
        Device::Cpu => vec![CPUExecutionProvider::default().build()],
    }
}

#[cfg(all(feature = "wav2vec2", not(feature = "cuda")))]
fn execution_providers(_device: Device) -> Vec<ExecutionProviderDispatch> {
    vec![CPUExecutionProvider::default().build()]
}

#[cfg(feature = "wav2vec2")]
fn load_vocab(path: &Path, model: &str) -> Result<CtcVocab> {
    let data = std::fs::read_to_string(path)?;
    let raw: HashMap<String, usize> =
        serde_json::from_str(&data).map_err(|e| VoxalignError::ModelLoad {
            model: model.to_string(),
            message: format!("Failed to parse vocab.json: {}", e),
        })?;
    Ok(CtcVocab::from_token_map(&raw))
}

/// Zero-mean, unit-variance normalization the model expects at its input.
pub fn normalize(samples: &[f32]) -> Vec<f32> {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = var.sqrt().max(1e-7);
    samples
        .iter()
        .map(|&x| ((x as f64 - mean) / std) as f32)
        .collect()
}

/// One loaded wav2vec2 model.
///
/// The Session is wrapped in a Mutex because onnxruntime inference takes
/// the session mutably.
#[cfg(feature = "wav2vec2")]
pub struct Wav2Vec2AlignBackend {
    session: Mutex<Session>,
    vocab: CtcVocab,
    language: String,
}

#[cfg(feature = "wav2vec2")]
impl std::fmt::Debug for Wav2Vec2AlignBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wav2Vec2AlignBackend")
            .field("language", &self.language)
            .field("session", &"<Session>")
            .finish()
    }
}

#[cfg(feature = "wav2vec2")]
fn inference_err(message: String) -> VoxalignError {
    VoxalignError::Inference {
        stage: "alignment".to_string(),
        message,
    }
}

#[cfg(feature = "wav2vec2")]
impl AlignBackend for Wav2Vec2AlignBackend {
    fn align_span(&self, samples: &[f32], text: &str) -> Result<Vec<WordAlignment>> {
        if samples.is_empty() || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let normalized = normalize(samples);
        let input = Array2::from_shape_vec((1, normalized.len()), normalized)
            .map_err(|e| inference_err(format!("Failed to shape input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| inference_err(format!("Failed to acquire session lock: {}", e)))?;

        let outputs = session
            .run(inputs![
                "input_values" => TensorRef::from_array_view(input.view())
                    .map_err(|e| inference_err(format!("Failed to bind input tensor: {}", e)))?,
            ])
            .map_err(|e| inference_err(format!("ONNX inference failed: {}", e)))?;

        let logits = outputs
            .get("logits")
            .ok_or_else(|| inference_err("model produced no logits output".to_string()))?
            .try_extract_array::<f32>()
            .map_err(|e| inference_err(format!("Failed to read logits: {}", e)))?;

        // Expect [batch, frames, vocab]
        let shape = logits.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(inference_err(format!(
                "unexpected logits shape {:?}",
                shape
            )));
        }
        let frames = shape[1];
        let vocab_size = shape[2];

        let log_probs =
            decode::log_softmax_rows(logits.iter().copied().collect(), vocab_size);
        let emissions = Emissions::new(&log_probs, vocab_size)?;

        // The encoder's downsampling ratio gives the frame stride.
        let stride_secs = samples.len() as f32 / frames as f32 / defaults::SAMPLE_RATE as f32;

        decode::align_emissions(&emissions, text, &self.vocab, stride_secs)
    }

    fn language(&self) -> &str {
        &self.language
    }
}
