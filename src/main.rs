use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use voxalign::VoxalignError;
use voxalign::audio::codec::{CommandRunner, SystemCommandRunner};
use voxalign::audio::wav;
use voxalign::cli::{Cli, Commands};
use voxalign::config::Config;
use voxalign::defaults;
use voxalign::models::catalog::{self, AlignModelInfo};
use voxalign::pipeline::{Pipeline, PipelineConfig};
use voxalign::transcript::Transcript;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        None => {
            run_transcribe_command(&cli)?;
        }
        Some(Commands::Models) => {
            let config = load_config(cli.config.as_deref())?;
            print_models(&config);
        }
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_deref())?;
            check_dependencies(&config);
        }
    }

    Ok(())
}

/// Route library logs to stderr, keeping stdout clean for the transcript.
///
/// `-v` raises the filter to info (stage progress), `-vv` to debug.
/// RUST_LOG still wins when set.
fn init_logging(quiet: bool, verbose: u8) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config); missing file is an error
/// 2. Default config path (~/.config/voxalign/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        if !path.exists() {
            return Err(VoxalignError::ConfigFileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())
    };

    Ok(config.with_env_overrides())
}

/// Transcribe the positional audio file, or WAV piped on stdin.
fn run_transcribe_command(cli: &Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.models.asr_model = model.clone();
    }
    let request = build_request(&config, cli);

    let pipeline = Pipeline::new(&config);

    let transcript = match &cli.audio {
        Some(path) => {
            if !cli.quiet {
                eprintln!("Transcribing {}...", path.display());
            }
            pipeline.run_file(path, &request)?
        }
        None => {
            if std::io::stdin().is_terminal() {
                eprintln!("No audio file given and stdin is a terminal.");
                eprintln!("Usage: voxalign <AUDIO>   or   voxalign < audio.wav");
                std::process::exit(2);
            }
            let audio = wav::read_wav_from(std::io::stdin().lock())?;
            pipeline.run(audio, &request)?
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&transcript)?);
    } else {
        println!("{}", transcript.text);
    }

    if cli.verbose >= 2 {
        print_word_timings(&transcript);
    }

    Ok(())
}

/// Merge CLI overrides onto the configured per-run knobs.
///
/// Range and language checks stay in the pipeline; anything out of bounds
/// fails there before any stage runs.
fn build_request(config: &Config, cli: &Cli) -> PipelineConfig {
    let mut request = config.pipeline.clone();
    if let Some(device) = cli.device {
        request.device = device;
    }
    if let Some(batch_size) = cli.batch_size {
        request.batch_size = batch_size;
    }
    if let Some(compute_type) = cli.compute_type {
        request.compute_type = compute_type;
    }
    if let Some(language) = &cli.language {
        request.language = language.clone();
    }
    if let Some(chunk_size) = cli.chunk_size {
        request.chunk_size = chunk_size;
    }
    request
}

/// Dump per-word timings to stderr, one indented line per word.
fn print_word_timings(transcript: &Transcript) {
    for segment in &transcript.segments {
        eprintln!(
            "[{:7.2}s - {:7.2}s] {}",
            segment.start,
            segment.end,
            segment.text.trim()
        );
        for word in &segment.words {
            eprintln!(
                "  {:7.2}s - {:7.2}s  {:3.0}%  {}",
                word.start,
                word.end,
                word.confidence * 100.0,
                word.word
            );
        }
    }
}

/// Print both model catalogs with install state under the configured roots.
fn print_models(config: &Config) {
    println!(
        "Recognition models (current: {}, root: {}):",
        config.models.asr_model.green(),
        config.models.asr_root.display()
    );
    for model in catalog::list_asr_models() {
        let marker = if model.name == config.models.asr_model {
            "●".green().to_string()
        } else {
            " ".to_string()
        };
        let scope = if model.english_only {
            "English-only"
        } else {
            "multilingual"
        };
        let state = if asr_model_installed(config, model.name) {
            "installed".green().to_string()
        } else {
            "not installed".dimmed().to_string()
        };
        println!(
            "  {} {:<12} {:>5} MB  {:<13} {}",
            marker, model.name, model.size_mb, scope, state
        );
    }

    println!();
    println!(
        "Alignment models (root: {}):",
        config.models.align_root.display()
    );
    for model in catalog::list_align_models() {
        let state = if align_model_installed(config, model) {
            "installed".green().to_string()
        } else {
            "not installed".dimmed().to_string()
        };
        println!("  {:<4} {:<52} {}", model.language, model.model_id, state);
    }
}

/// Whether a recognition model's ggml file (quantized or full) is on disk.
fn asr_model_installed(config: &Config, name: &str) -> bool {
    let root = &config.models.asr_root;
    root.join(catalog::ggml_file_name_quantized(name)).exists()
        || root.join(catalog::ggml_file_name(name)).exists()
}

/// Whether an alignment model's ONNX export and vocab are on disk.
fn align_model_installed(config: &Config, model: &AlignModelInfo) -> bool {
    let dir = config.models.align_root.join(model.dir_name());
    dir.join("model.onnx").exists() && dir.join("vocab.json").exists()
}

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues
    Warning(String),
}

/// Probe the codec binary by asking it for its version.
fn check_codec(runner: &dyn CommandRunner, binary: &str) -> CheckResult {
    match runner.run(binary, &["-version"]) {
        Ok(output) if output.status.success() => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("'{}' found but -version failed", binary)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", binary, e)),
    }
}

/// Run all dependency checks and print results.
fn check_dependencies(config: &Config) {
    println!("Checking voxalign dependencies...\n");

    // Codec binary (decode of compressed inputs, persisted-copy encoding)
    print!("{} (audio decode/convert): ", config.codec.binary);
    match check_codec(&SystemCommandRunner, &config.codec.binary) {
        CheckResult::Ok => println!("{}", "✓ OK".green()),
        CheckResult::NotFound => {
            println!("{}", "✗ NOT FOUND".red());
            println!("  Install: sudo apt install ffmpeg  (Debian/Ubuntu)");
            println!("           sudo pacman -S ffmpeg    (Arch)");
        }
        CheckResult::Warning(msg) => println!("{}", format!("⚠ WARNING: {}", msg).yellow()),
    }

    // Recognition models under the configured root
    let installed = catalog::list_asr_models()
        .iter()
        .filter(|m| asr_model_installed(config, m.name))
        .count();
    print!(
        "Recognition models ({}): ",
        config.models.asr_root.display()
    );
    if installed > 0 {
        println!("{}", format!("✓ {} installed", installed).green());
    } else {
        println!("{}", "✗ NONE FOUND".red());
        println!(
            "  Place ggml model files (e.g. {}) under the root",
            catalog::ggml_file_name(&config.models.asr_model)
        );
    }

    // Alignment models under the configured root
    let aligned = catalog::list_align_models()
        .iter()
        .filter(|m| align_model_installed(config, m))
        .count();
    print!(
        "Alignment models ({}): ",
        config.models.align_root.display()
    );
    if aligned > 0 {
        println!("{}", format!("✓ {} installed", aligned).green());
    } else {
        println!("{}", "✗ NONE FOUND".red());
        println!("  Each model needs <root>/<model-dir>/model.onnx and vocab.json");
        println!("  Run `voxalign models` for the per-language directory names");
    }

    // GPU acceleration
    println!();
    println!("GPU acceleration:");
    println!("  Compiled backend: {}", defaults::gpu_backend());
}
