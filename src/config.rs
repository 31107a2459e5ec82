use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::defaults;
use crate::error::{Result, VoxalignError};
use crate::pipeline::PipelineConfig;

/// Compute device models execute on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = VoxalignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda),
            other => Err(VoxalignError::Validation {
                field: "device".to_string(),
                message: format!("unknown device '{other}', expected cpu or cuda"),
            }),
        }
    }
}

/// Numeric precision for recognition model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComputeType {
    #[default]
    Int8,
    Float16,
    Float32,
}

impl ComputeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeType::Int8 => "int8",
            ComputeType::Float16 => "float16",
            ComputeType::Float32 => "float32",
        }
    }
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputeType {
    type Err = VoxalignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int8" => Ok(ComputeType::Int8),
            "float16" => Ok(ComputeType::Float16),
            "float32" => Ok(ComputeType::Float32),
            other => Err(VoxalignError::Validation {
                field: "compute_type".to_string(),
                message: format!("unknown compute type '{other}', expected int8, float16 or float32"),
            }),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub storage: StorageConfig,
    pub codec: CodecConfig,
    pub device: DeviceConfig,
    pub pipeline: PipelineConfig,
}

/// Model storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    pub asr_root: PathBuf,
    pub align_root: PathBuf,
    pub asr_model: String,
}

/// Persisted audio storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub work_dir: PathBuf,
}

/// Audio codec configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    pub binary: String,
}

/// Device access slots: how many pipeline runs may hold each device at once
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub cpu_slots: usize,
    pub cuda_slots: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            asr_root: PathBuf::from(defaults::MODEL_ROOT),
            align_root: PathBuf::from(defaults::ALIGN_MODEL_ROOT),
            asr_model: defaults::DEFAULT_ASR_MODEL.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(defaults::WORK_DIR),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            binary: defaults::FFMPEG_BIN.to_string(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            cpu_slots: 1,
            cuda_slots: 1,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Panics on invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(VoxalignError::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(e) => {
                panic!("Failed to load config from {}: {}", path.display(), e);
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXALIGN_ASR_MODEL → models.asr_model
    /// - VOXALIGN_DEVICE → pipeline.device
    /// - VOXALIGN_LANGUAGE → pipeline.language
    /// - VOXALIGN_WORK_DIR → storage.work_dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("VOXALIGN_ASR_MODEL")
            && !model.is_empty()
        {
            self.models.asr_model = model;
        }

        if let Ok(device) = std::env::var("VOXALIGN_DEVICE")
            && !device.is_empty()
        {
            match device.parse() {
                Ok(parsed) => self.pipeline.device = parsed,
                Err(e) => log::warn!("ignoring VOXALIGN_DEVICE: {e}"),
            }
        }

        if let Ok(language) = std::env::var("VOXALIGN_LANGUAGE")
            && !language.is_empty()
        {
            self.pipeline.language = language;
        }

        if let Ok(work_dir) = std::env::var("VOXALIGN_WORK_DIR")
            && !work_dir.is_empty()
        {
            self.storage.work_dir = PathBuf::from(work_dir);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxalign/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("voxalign")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_voxalign_env() {
        remove_env("VOXALIGN_ASR_MODEL");
        remove_env("VOXALIGN_DEVICE");
        remove_env("VOXALIGN_LANGUAGE");
        remove_env("VOXALIGN_WORK_DIR");
    }

    #[test]
    fn test_device_parse_round_trip() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!(Device::Cuda.to_string(), "cuda");
        assert!("gpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_compute_type_parse_round_trip() {
        assert_eq!("int8".parse::<ComputeType>().unwrap(), ComputeType::Int8);
        assert_eq!(
            "float16".parse::<ComputeType>().unwrap(),
            ComputeType::Float16
        );
        assert_eq!(
            "float32".parse::<ComputeType>().unwrap(),
            ComputeType::Float32
        );
        assert_eq!(ComputeType::Float16.to_string(), "float16");
        assert!("int4".parse::<ComputeType>().is_err());
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        // Model defaults
        assert_eq!(config.models.asr_root, PathBuf::from("models"));
        assert_eq!(config.models.align_root, PathBuf::from("models/alignment"));
        assert_eq!(config.models.asr_model, "large-v2");

        // Storage and codec defaults
        assert_eq!(config.storage.work_dir, PathBuf::from("audios"));
        assert_eq!(config.codec.binary, "ffmpeg");

        // Device slot defaults
        assert_eq!(config.device.cpu_slots, 1);
        assert_eq!(config.device.cuda_slots, 1);

        // Request defaults
        assert_eq!(config.pipeline.device, Device::Cpu);
        assert_eq!(config.pipeline.batch_size, 1);
        assert_eq!(config.pipeline.compute_type, ComputeType::Int8);
        assert_eq!(config.pipeline.language, "auto");
        assert_eq!(config.pipeline.chunk_size, 20);
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [models]
            asr_root = "/srv/models"
            align_root = "/srv/models/align"
            asr_model = "small"

            [storage]
            work_dir = "/var/lib/voxalign"

            [codec]
            binary = "/usr/local/bin/ffmpeg"

            [device]
            cpu_slots = 2
            cuda_slots = 1

            [pipeline]
            device = "cuda"
            batch_size = 4
            compute_type = "float16"
            language = "en"
            chunk_size = 15
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.models.asr_root, PathBuf::from("/srv/models"));
        assert_eq!(config.models.align_root, PathBuf::from("/srv/models/align"));
        assert_eq!(config.models.asr_model, "small");

        assert_eq!(config.storage.work_dir, PathBuf::from("/var/lib/voxalign"));
        assert_eq!(config.codec.binary, "/usr/local/bin/ffmpeg");

        assert_eq!(config.device.cpu_slots, 2);
        assert_eq!(config.device.cuda_slots, 1);

        assert_eq!(config.pipeline.device, Device::Cuda);
        assert_eq!(config.pipeline.batch_size, 4);
        assert_eq!(config.pipeline.compute_type, ComputeType::Float16);
        assert_eq!(config.pipeline.language, "en");
        assert_eq!(config.pipeline.chunk_size, 15);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [models]
            asr_model = "base"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        // Only the model should be overridden
        assert_eq!(config.models.asr_model, "base");

        // Everything else should be defaults
        assert_eq!(config.models.asr_root, PathBuf::from("models"));
        assert_eq!(config.storage.work_dir, PathBuf::from("audios"));
        assert_eq!(config.codec.binary, "ffmpeg");
        assert_eq!(config.pipeline.device, Device::Cpu);
        assert_eq!(config.pipeline.language, "auto");
    }

    #[test]
    fn test_env_override_model() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxalign_env();

        set_env("VOXALIGN_ASR_MODEL", "medium");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.models.asr_model, "medium");
        assert_eq!(config.pipeline.language, "auto"); // Not overridden

        clear_voxalign_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxalign_env();

        set_env("VOXALIGN_ASR_MODEL", "large-v3");
        set_env("VOXALIGN_DEVICE", "cuda");
        set_env("VOXALIGN_LANGUAGE", "de");
        set_env("VOXALIGN_WORK_DIR", "/tmp/voxalign-work");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.models.asr_model, "large-v3");
        assert_eq!(config.pipeline.device, Device::Cuda);
        assert_eq!(config.pipeline.language, "de");
        assert_eq!(config.storage.work_dir, PathBuf::from("/tmp/voxalign-work"));

        clear_voxalign_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxalign_env();

        set_env("VOXALIGN_ASR_MODEL", "");
        let config = Config::default().with_env_overrides();

        // Empty string should not override the default
        assert_eq!(config.models.asr_model, "large-v2");

        clear_voxalign_env();
    }

    #[test]
    fn test_env_override_invalid_device_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxalign_env();

        set_env("VOXALIGN_DEVICE", "tpu");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.pipeline.device, Device::Cpu);

        clear_voxalign_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [models
            asr_model = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());

        assert!(result.is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains(".config"));
        assert!(path_str.contains("voxalign"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_voxalign_config_12345.toml");
        let config = Config::load_or_default(missing_path);

        assert_eq!(config, Config::default());
    }

    #[test]
    #[should_panic(expected = "Failed to load config")]
    fn test_load_or_default_panics_on_invalid_toml() {
        let invalid_toml = r#"
            [models
            asr_model = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        // Should panic on invalid TOML, not return defaults
        Config::load_or_default(temp_file.path());
    }
}
