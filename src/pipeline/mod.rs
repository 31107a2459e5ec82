//! Staged audio-to-transcript pipeline.
//!
//! Stages run sequentially per file: ingestion, transcription, alignment,
//! assembly. Cancellation is checked at every stage boundary.

pub mod cancel;
pub mod orchestrator;

pub use cancel::CancelToken;
pub use orchestrator::{Pipeline, PipelineConfig};
