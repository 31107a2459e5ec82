//! Command-line interface for voxalign
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ComputeType, Device};

/// Audio transcription with word-level timing alignment
#[derive(Parser, Debug)]
#[command(
    name = "voxalign",
    version,
    about = "Audio transcription with word-level timing alignment"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Audio file to transcribe (any format ffmpeg decodes). Omit to read WAV from stdin
    #[arg(value_name = "AUDIO")]
    pub audio: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: stage progress, -vv: per-word timings)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Device to run inference on (cpu, cuda)
    #[arg(long, value_name = "DEVICE", value_parser = parse_device)]
    pub device: Option<Device>,

    /// Recognition windows decoded per batch (1-16)
    #[arg(long, short = 'b', value_name = "N")]
    pub batch_size: Option<u32>,

    /// Numeric precision for recognition weights (int8, float16, float32)
    #[arg(long, value_name = "TYPE", value_parser = parse_compute_type)]
    pub compute_type: Option<ComputeType>,

    /// Language code for transcription (default: auto-detect). Examples: auto, en, de, es, fr
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Recognition window length in seconds (1-30)
    #[arg(long, short = 'c', value_name = "SECONDS")]
    pub chunk_size: Option<u32>,

    /// Recognition model (default: large-v2). Use base.en for English-only audio
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Emit the full transcript (text, language, segments, words) as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a device name into a [`Device`].
fn parse_device(s: &str) -> Result<Device, String> {
    s.trim()
        .parse()
        .map_err(|e: crate::VoxalignError| e.to_string())
}

/// Parse a compute type name into a [`ComputeType`].
fn parse_compute_type(s: &str) -> Result<ComputeType, String> {
    s.trim()
        .parse()
        .map_err(|e: crate::VoxalignError| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List recognition and alignment models
    Models,

    /// Check external dependencies and model storage
    Check,
}
