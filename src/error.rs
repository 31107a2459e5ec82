//! Error types for voxalign.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxalignError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration value for {field}: {message}")]
    Validation { field: String, message: String },

    // Audio errors
    #[error("Failed to read audio: {message}")]
    AudioRead { message: String },

    #[error("Audio conversion failed: {message}")]
    AudioConversion { message: String },

    // Model errors
    #[error("Model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Failed to load model {model}: {message}")]
    ModelLoad { model: String, message: String },

    #[error("No alignment model available for language '{language}'")]
    UnsupportedLanguage { language: String },

    // Pipeline errors
    #[error("{stage} inference failed: {message}")]
    Inference { stage: String, message: String },

    #[error("Pipeline cancelled before {stage}")]
    Cancelled { stage: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxalignError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = VoxalignError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_validation_display() {
        let error = VoxalignError::Validation {
            field: "batch_size".to_string(),
            message: "must be between 1 and 16".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for batch_size: must be between 1 and 16"
        );
    }

    #[test]
    fn test_audio_read_display() {
        let error = VoxalignError::AudioRead {
            message: "zero channels".to_string(),
        };
        assert_eq!(error.to_string(), "Failed to read audio: zero channels");
    }

    #[test]
    fn test_audio_conversion_display() {
        let error = VoxalignError::AudioConversion {
            message: "ffmpeg exited with status 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio conversion failed: ffmpeg exited with status 1"
        );
    }

    #[test]
    fn test_model_not_found_display() {
        let error = VoxalignError::ModelNotFound {
            path: "/models/ggml-large-v2.bin".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Model not found at /models/ggml-large-v2.bin"
        );
    }

    #[test]
    fn test_model_load_display() {
        let error = VoxalignError::ModelLoad {
            model: "large-v2".to_string(),
            message: "corrupt file".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to load model large-v2: corrupt file"
        );
    }

    #[test]
    fn test_unsupported_language_display() {
        let error = VoxalignError::UnsupportedLanguage {
            language: "xx".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No alignment model available for language 'xx'"
        );
    }

    #[test]
    fn test_inference_display() {
        let error = VoxalignError::Inference {
            stage: "transcription".to_string(),
            message: "out of memory".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "transcription inference failed: out of memory"
        );
    }

    #[test]
    fn test_cancelled_display() {
        let error = VoxalignError::Cancelled {
            stage: "alignment".to_string(),
        };
        assert_eq!(error.to_string(), "Pipeline cancelled before alignment");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoxalignError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: VoxalignError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(VoxalignError::AudioRead {
                message: "test error".to_string(),
            })
        }
        assert!(returns_error().is_err());
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: VoxalignError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoxalignError>();
        assert_sync::<VoxalignError>();
    }

    #[test]
    fn test_error_debug_format() {
        let error = VoxalignError::ModelNotFound {
            path: "/test/path".to_string(),
        };
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("ModelNotFound"));
        assert!(debug_str.contains("/test/path"));
    }
}
