//! Default configuration constants for voxalign.
//!
//! This module provides shared constants used across the configuration,
//! validation, and pipeline types to ensure consistency and eliminate
//! duplication.

/// Canonical audio sample rate in Hz.
///
/// 16kHz is what both the recognition and alignment models consume. Persisted
/// audio is decoded back to this rate before any inference runs.
pub const SAMPLE_RATE: u32 = 16000;

/// Default recognition model name.
///
/// "large-v2" (multilingual) supports auto-detection of any language and is
/// the strongest general-purpose choice. Smaller models trade accuracy for
/// speed; see the model catalog.
pub const DEFAULT_ASR_MODEL: &str = "large-v2";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Languages with a catalogued alignment model.
///
/// Requests may name any of these explicitly, or "auto" to let recognition
/// detect the language. A detected language outside this set fails alignment
/// model resolution.
pub const SUPPORTED_LANGUAGES: [&str; 10] = [
    "en", "es", "fr", "de", "it", "ja", "zh", "nl", "uk", "pt",
];

/// Suffix for English-only model variants.
pub const ENGLISH_ONLY_SUFFIX: &str = ".en";

/// Inclusive lower bound for recognition windows per batch.
pub const MIN_BATCH_SIZE: u32 = 1;

/// Inclusive upper bound for recognition windows per batch.
///
/// Bounds device memory: every window in a batch is resident at once.
pub const MAX_BATCH_SIZE: u32 = 16;

/// Inclusive lower bound for the recognition window length in seconds.
pub const MIN_CHUNK_SECS: u32 = 1;

/// Inclusive upper bound for the recognition window length in seconds.
///
/// 30 seconds is the receptive field of the recognition models; longer
/// windows would be truncated silently.
pub const MAX_CHUNK_SECS: u32 = 30;

/// Default number of recognition windows per batch.
pub const DEFAULT_BATCH_SIZE: u32 = 1;

/// Default recognition window length in seconds.
pub const DEFAULT_CHUNK_SECS: u32 = 20;

/// Default directory persisted audio is written into, relative to the
/// working directory unless configured absolute.
pub const WORK_DIR: &str = "audios";

/// Default root directory for recognition models.
pub const MODEL_ROOT: &str = "models";

/// Default root directory for alignment models.
pub const ALIGN_MODEL_ROOT: &str = "models/alignment";

/// Container extension of the persisted audio copy.
pub const PERSIST_EXT: &str = "mp3";

/// Codec binary used for audio conversion and decoding.
pub const FFMPEG_BIN: &str = "ffmpeg";

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// If no GPU backend is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") { "CUDA" } else { "CPU" }
}
