//! Audio handling: in-memory buffers, WAV io, and the codec boundary
//! used to persist and decode pipeline input.

pub mod buffer;
pub mod codec;
pub mod ingest;
pub mod wav;

pub use buffer::AudioBuffer;
pub use codec::{AudioCodec, CommandRunner, FfmpegCodec, SystemCommandRunner, WavCodec};
pub use ingest::{AudioIngestor, PersistedAudio};
