//! Word-level forced alignment.

pub mod backend;
pub mod decode;
pub mod engine;
pub mod wav2vec2;

pub use backend::{AlignBackend, AlignProvider, MockAlignBackend, MockAlignProvider};
pub use engine::AlignmentEngine;
pub use wav2vec2::Wav2Vec2AlignProvider;
