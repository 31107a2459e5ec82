//! Speech recognition: backend seams, the chunked recognition engine, and
//! the whisper-rs implementation.

pub mod backend;
pub mod engine;
pub mod whisper;

pub use backend::{AsrBackend, AsrProvider, BatchTranscription, MockAsrBackend, MockAsrProvider};
pub use engine::{TranscriptionEngine, TranscriptionOutput};
pub use whisper::WhisperAsrProvider;
