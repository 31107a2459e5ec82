//! End-to-end pipeline: ingest an audio file, recognize speech, align words.
//!
//! `Pipeline` owns the stage wiring (codec, recognition provider, alignment
//! provider, device pool) and `run` drives one file through all stages in
//! order, failing fast on the first stage error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::align::{AlignProvider, AlignmentEngine, Wav2Vec2AlignProvider};
use crate::audio::codec::{AudioCodec, FfmpegCodec};
use crate::audio::{AudioBuffer, AudioIngestor, PersistedAudio};
use crate::config::{ComputeType, Config, Device};
use crate::defaults;
use crate::device::DevicePool;
use crate::error::{Result, VoxalignError};
use crate::pipeline::cancel::CancelToken;
use crate::stt::backend::AsrProvider;
use crate::stt::{TranscriptionEngine, WhisperAsrProvider};
use crate::transcript::{self, Transcript};

/// Per-run knobs for a pipeline invocation.
///
/// Model paths and storage locations live in [`Config`]; this struct holds
/// only the values that may change from one run to the next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Device the recognition and alignment models run on.
    pub device: Device,

    /// Windows recognized per backend call, 1..=16.
    pub batch_size: u32,

    /// Numeric precision for recognition model weights.
    pub compute_type: ComputeType,

    /// Language code, or "auto" to detect from the first batch.
    pub language: String,

    /// Window length in seconds, 1..=30.
    pub chunk_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            batch_size: defaults::DEFAULT_BATCH_SIZE,
            compute_type: ComputeType::Int8,
            language: defaults::AUTO_LANGUAGE.to_string(),
            chunk_size: defaults::DEFAULT_CHUNK_SECS,
        }
    }
}

impl PipelineConfig {
    /// Reject out-of-range knobs before any stage runs.
    pub fn validate(&self) -> Result<()> {
        if !(defaults::MIN_BATCH_SIZE..=defaults::MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(VoxalignError::Validation {
                field: "batch_size".to_string(),
                message: format!(
                    "{} is outside {}..={}",
                    self.batch_size,
                    defaults::MIN_BATCH_SIZE,
                    defaults::MAX_BATCH_SIZE
                ),
            });
        }
        if !(defaults::MIN_CHUNK_SECS..=defaults::MAX_CHUNK_SECS).contains(&self.chunk_size) {
            return Err(VoxalignError::Validation {
                field: "chunk_size".to_string(),
                message: format!(
                    "{} is outside {}..={}",
                    self.chunk_size,
                    defaults::MIN_CHUNK_SECS,
                    defaults::MAX_CHUNK_SECS
                ),
            });
        }
        if self.language != defaults::AUTO_LANGUAGE
            && !defaults::SUPPORTED_LANGUAGES.contains(&self.language.as_str())
        {
            return Err(VoxalignError::Validation {
                field: "language".to_string(),
                message: format!(
                    "'{}' is not '{}' or one of {}",
                    self.language,
                    defaults::AUTO_LANGUAGE,
                    defaults::SUPPORTED_LANGUAGES.join(", ")
                ),
            });
        }
        Ok(())
    }
}

/// Fixed wiring for pipeline runs.
pub struct Pipeline {
    ingestor: AudioIngestor,
    asr: Box<dyn AsrProvider>,
    align: Box<dyn AlignProvider>,
    devices: Arc<DevicePool>,
    cancel: CancelToken,
    asr_model: String,
    work_dir: PathBuf,
}

impl Pipeline {
    /// Wire the default stages from `config`.
    pub fn new(config: &Config) -> Self {
        let codec: Arc<dyn AudioCodec> = Arc::new(FfmpegCodec::with_binary(&config.codec.binary));
        Self {
            ingestor: AudioIngestor::new(codec),
            asr: Box::new(WhisperAsrProvider::new(&config.models.asr_root)),
            align: Box::new(Wav2Vec2AlignProvider::new(&config.models.align_root)),
            devices: Arc::new(DevicePool::new(&config.device)),
            cancel: CancelToken::new(),
            asr_model: config.models.asr_model.clone(),
            work_dir: config.storage.work_dir.clone(),
        }
    }

    /// Replace the audio codec, for tests or WAV-only deployments.
    pub fn with_codec(mut self, codec: Arc<dyn AudioCodec>) -> Self {
        self.ingestor = AudioIngestor::new(codec);
        self
    }

    pub fn with_asr_provider(mut self, provider: Box<dyn AsrProvider>) -> Self {
        self.asr = provider;
        self
    }

    pub fn with_align_provider(mut self, provider: Box<dyn AlignProvider>) -> Self {
        self.align = provider;
        self
    }

    /// Share a device pool across pipelines so concurrent runs queue for slots.
    pub fn with_device_pool(mut self, pool: Arc<DevicePool>) -> Self {
        self.devices = pool;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_asr_model(mut self, model: &str) -> Self {
        self.asr_model = model.to_string();
        self
    }

    pub fn with_work_dir(mut self, dir: &Path) -> Self {
        self.work_dir = dir.to_path_buf();
        self
    }

    /// Token that cancels this pipeline's runs at the next stage boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run decoded audio through recognition and alignment.
    ///
    /// Stages run in order: persist a mono copy under the work directory,
    /// recognize speech in windows, align each segment's words, assemble the
    /// transcript. The first stage error aborts the run; the persisted copy
    /// is left in place either way.
    pub fn run(&self, audio: AudioBuffer, config: &PipelineConfig) -> Result<Transcript> {
        config.validate()?;

        self.checkpoint("ingestion")?;
        let mono = self.ingestor.ingest(audio);
        let persisted = self.persist(&mono)?;
        log::info!(
            "persisted {:.1}s of audio to {}",
            mono.duration_secs(),
            persisted.path().display()
        );
        let prepared = self.ingestor.load(&persisted)?;

        self.checkpoint("transcription")?;
        let permit = self.devices.acquire(config.device);
        log::debug!("acquired {} slot", permit.device());

        // Scoped so the recognition model is released before alignment loads.
        let output = {
            let engine = TranscriptionEngine::load(
                self.asr.as_ref(),
                &self.asr_model,
                config.device,
                config.compute_type,
            )?;
            engine.transcribe(&prepared, config.batch_size, &config.language, config.chunk_size)?
        };

        if output.segments.is_empty() {
            log::info!("no speech recognized in {}", persisted.path().display());
            return Ok(Transcript {
                text: String::new(),
                language: output.language,
                segments: Vec::new(),
            });
        }

        self.checkpoint("alignment")?;
        let aligned = {
            let engine =
                AlignmentEngine::load(self.align.as_ref(), &output.language, config.device)?;
            engine.align(&output.segments, &prepared)?
        };
        drop(permit);

        self.checkpoint("assembly")?;
        Ok(Transcript {
            text: transcript::assemble(&aligned),
            language: output.language,
            segments: aligned,
        })
    }

    /// Decode `path` with the codec, then [`run`](Self::run) the result.
    pub fn run_file(&self, path: &Path, config: &PipelineConfig) -> Result<Transcript> {
        let audio = self.ingestor.load(&PersistedAudio::new(path))?;
        self.run(audio, config)
    }

    fn persist(&self, audio: &AudioBuffer) -> Result<PersistedAudio> {
        let name = format!("{}.{}", uuid::Uuid::new_v4(), defaults::PERSIST_EXT);
        self.ingestor.materialize(audio, &self.work_dir.join(name))
    }

    fn checkpoint(&self, stage: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(VoxalignError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{MockAlignBackend, MockAlignProvider};
    use crate::audio::WavCodec;
    use crate::stt::{MockAsrBackend, MockAsrProvider};

    fn mock_pipeline(work_dir: &Path) -> (Pipeline, Arc<MockAsrProvider>) {
        let asr = Arc::new(MockAsrProvider::new(MockAsrBackend::new("mock")));
        let align = MockAlignProvider::new(MockAlignBackend::new("en"));
        let pipeline = Pipeline::new(&Config::default())
            .with_codec(Arc::new(WavCodec))
            .with_asr_provider(Box::new(Arc::clone(&asr)))
            .with_align_provider(Box::new(align))
            .with_work_dir(work_dir);
        (pipeline, asr)
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn batch_size_out_of_range_is_rejected() {
        for bad in [0, 17] {
            let config = PipelineConfig {
                batch_size: bad,
                ..PipelineConfig::default()
            };
            match config.validate() {
                Err(VoxalignError::Validation { field, .. }) => assert_eq!(field, "batch_size"),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn chunk_size_out_of_range_is_rejected() {
        for bad in [0, 31] {
            let config = PipelineConfig {
                chunk_size: bad,
                ..PipelineConfig::default()
            };
            match config.validate() {
                Err(VoxalignError::Validation { field, .. }) => assert_eq!(field, "chunk_size"),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_language_is_rejected() {
        let config = PipelineConfig {
            language: "tlh".to_string(),
            ..PipelineConfig::default()
        };
        match config.validate() {
            Err(VoxalignError::Validation { field, message }) => {
                assert_eq!(field, "language");
                assert!(message.contains("'tlh'"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn auto_and_listed_languages_pass_validation() {
        for lang in ["auto", "en", "uk", "zh"] {
            let config = PipelineConfig {
                language: lang.to_string(),
                ..PipelineConfig::default()
            };
            assert!(config.validate().is_ok(), "{lang} should validate");
        }
    }

    #[test]
    fn validation_happens_before_any_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, asr) = mock_pipeline(dir.path());
        let config = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        let audio = AudioBuffer::mono(vec![0.0; 1600], defaults::SAMPLE_RATE).unwrap();

        assert!(pipeline.run(audio, &config).is_err());
        assert!(asr.loads().is_empty(), "no model load before validation");
        let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftover.is_empty(), "no files persisted before validation");
    }

    #[test]
    fn cancelled_token_stops_before_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _asr) = mock_pipeline(dir.path());
        pipeline.cancel_token().cancel();
        let audio = AudioBuffer::mono(vec![0.0; 1600], defaults::SAMPLE_RATE).unwrap();

        match pipeline.run(audio, &PipelineConfig::default()) {
            Err(VoxalignError::Cancelled { stage }) => assert_eq!(stage, "ingestion"),
            other => panic!("expected cancellation, got {other:?}"),
        }
        let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftover.is_empty(), "cancelled run must not persist audio");
    }
}
