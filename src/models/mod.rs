//! Model metadata and path resolution.

pub mod catalog;

pub use catalog::{AlignModelInfo, AsrModelInfo};
