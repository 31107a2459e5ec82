//! voxalign - Audio transcription with word-level timestamps
//!
//! Offline pipeline: decode any audio format, recognize speech with whisper,
//! force-align each word with a wav2vec2 CTC model.

// Enforce error handling discipline: library code propagates, never panics
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod align;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod device;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod stt;
pub mod transcript;

// Pipeline
pub use pipeline::cancel::CancelToken;
pub use pipeline::orchestrator::{Pipeline, PipelineConfig};

// Core traits (provider → backend → engine)
pub use align::backend::{AlignBackend, AlignProvider};
pub use audio::codec::AudioCodec;
pub use stt::backend::{AsrBackend, AsrProvider};

// Error handling
pub use error::{Result, VoxalignError};

// Config
pub use config::{ComputeType, Config, Device};

// Output types
pub use transcript::{AlignedSegment, Segment, Transcript, WordAlignment};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
