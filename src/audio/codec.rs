//! Audio format conversion via external codec binaries.
//!
//! FfmpegCodec shells out to ffmpeg for compressed-format support; WavCodec
//! handles plain WAV files without any external dependency. The
//! CommandRunner seam keeps both testable without spawning real processes.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use crate::audio::wav;
use crate::defaults;
use crate::error::{Result, VoxalignError};

/// Converts audio files between formats and decodes them to raw PCM.
pub trait AudioCodec: Send + Sync {
    /// Convert `src` into the format implied by `dest`'s extension.
    fn convert(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Decode `src` to mono f32 samples at `sample_rate`.
    fn decode_pcm(&self, src: &Path, sample_rate: u32) -> Result<Vec<f32>>;
}

impl<T: AudioCodec + ?Sized> AudioCodec for Arc<T> {
    fn convert(&self, src: &Path, dest: &Path) -> Result<()> {
        (**self).convert(src, dest)
    }

    fn decode_pcm(&self, src: &Path, sample_rate: u32) -> Result<Vec<f32>> {
        (**self).decode_pcm(src, sample_rate)
    }
}

/// Runs external commands. Abstracted so tests can fake process output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output> {
        (**self).run(program, args)
    }
}

/// Spawns real processes with stdin detached.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
    }
}

/// ffmpeg-backed codec.
pub struct FfmpegCodec {
    binary: String,
    runner: Box<dyn CommandRunner>,
}

impl std::fmt::Debug for FfmpegCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegCodec")
            .field("binary", &self.binary)
            .finish()
    }
}

impl FfmpegCodec {
    pub fn new() -> Self {
        Self::with_binary(defaults::FFMPEG_BIN)
    }

    pub fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
            runner: Box::new(SystemCommandRunner),
        }
    }

    pub fn with_runner(binary: &str, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.to_string(),
            runner,
        }
    }

    /// Run the codec binary and map failures to AudioConversion errors.
    ///
    /// A missing binary gets an install hint; a non-zero exit status gets
    /// the trimmed stderr tail so the ffmpeg diagnostics survive.
    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.runner.run(&self.binary, args).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxalignError::AudioConversion {
                    message: format!(
                        "{} not found. Install it first:\n  Ubuntu/Debian: sudo apt install ffmpeg\n  Arch: sudo pacman -S ffmpeg",
                        self.binary
                    ),
                }
            } else {
                VoxalignError::AudioConversion {
                    message: format!("Failed to run {}: {}", self.binary, e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoxalignError::AudioConversion {
                message: format!(
                    "{} exited with {}: {}",
                    self.binary,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        Ok(output)
    }
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCodec for FfmpegCodec {
    fn convert(&self, src: &Path, dest: &Path) -> Result<()> {
        let src_str = src.to_string_lossy();
        let dest_str = dest.to_string_lossy();

        self.run_checked(&["-nostdin", "-y", "-i", &src_str, &dest_str])?;

        if !dest.exists() {
            return Err(VoxalignError::AudioConversion {
                message: format!("{} reported success but produced no file", self.binary),
            });
        }

        Ok(())
    }

    fn decode_pcm(&self, src: &Path, sample_rate: u32) -> Result<Vec<f32>> {
        let src_str = src.to_string_lossy();
        let rate_str = sample_rate.to_string();

        // Decode straight to stdout as little-endian 16-bit mono PCM
        let output = self.run_checked(&[
            "-nostdin",
            "-threads",
            "0",
            "-i",
            &src_str,
            "-f",
            "s16le",
            "-ac",
            "1",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &rate_str,
            "-",
        ])?;

        Ok(pcm_s16le_to_f32(&output.stdout))
    }
}

/// WAV passthrough codec. convert is a plain file copy; decode reads the
/// WAV directly and resamples in process.
#[derive(Debug, Clone, Default)]
pub struct WavCodec;

impl AudioCodec for WavCodec {
    fn convert(&self, src: &Path, dest: &Path) -> Result<()> {
        std::fs::copy(src, dest)?;
        Ok(())
    }

    fn decode_pcm(&self, src: &Path, sample_rate: u32) -> Result<Vec<f32>> {
        let audio = wav::read_wav(src)?;
        let source_rate = audio.sample_rate();
        let mono = audio.first_channel();

        if source_rate == sample_rate {
            return Ok(mono.into_samples());
        }

        Ok(wav::resample(mono.samples(), source_rate, sample_rate))
    }
}

fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// A CommandRunner with scripted responses for tests.
pub struct MockCommandRunner {
    responses: std::sync::Mutex<std::collections::VecDeque<std::io::Result<Output>>>,
    calls: std::sync::Mutex<Vec<(String, Vec<String>)>>,
    creates: Option<std::path::PathBuf>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::Mutex::new(Vec::new()),
            creates: None,
        }
    }

    /// Queue a successful run with the given stdout.
    pub fn with_output(self, stdout: &[u8]) -> Self {
        self.push(Ok(mock_output(0, stdout, b"")));
        self
    }

    /// Queue a failed run with the given stderr.
    pub fn with_exit_failure(self, stderr: &str) -> Self {
        self.push(Ok(mock_output(1, b"", stderr.as_bytes())));
        self
    }

    /// Queue a spawn error, as if the binary were missing.
    pub fn with_spawn_error(self, kind: std::io::ErrorKind) -> Self {
        self.push(Err(std::io::Error::new(kind, "spawn failed")));
        self
    }

    /// Touch `path` whenever a queued run succeeds, imitating a codec
    /// writing its output file.
    pub fn with_created_file(mut self, path: &Path) -> Self {
        self.creates = Some(path.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn push(&self, response: std::io::Result<Output>) {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(response);
    }
}

impl Default for MockCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((
                program.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            ));

        let response = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(mock_output(0, b"", b"")));

        if let Ok(ref output) = response
            && output.status.success()
            && let Some(ref path) = self.creates
        {
            std::fs::write(path, b"").ok();
        }

        response
    }
}

fn mock_output(code: i32, stdout: &[u8], stderr: &[u8]) -> Output {
    #[cfg(unix)]
    let status = {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    };
    #[cfg(not(unix))]
    let status = {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    };

    Output {
        status,
        stdout: stdout.to_vec(),
        stderr: stderr.to_vec(),
    }
}
