//! Build script: embeds the git hash and pre-flight checks the CUDA toolkit.
//!
//! whisper-rs-sys and ort both fail late and cryptically when the toolkit is
//! missing, so when the `cuda` feature is on we verify `nvcc` exists before
//! either starts compiling and print diagnostic info for version mismatches.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        check_cuda();
    }
}

fn check_cuda() {
    let output = Command::new("nvcc").arg("--version").output();
    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            let version = parse_cuda_version(&text);

            println!("cargo::warning=");
            if let Some((major, minor)) = version {
                println!("cargo::warning=CUDA build: toolkit {}.{}", major, minor);
            } else {
                println!("cargo::warning=CUDA build: toolkit version unknown");
            }
            if let Some(driver_cuda) = get_driver_cuda_version() {
                println!(
                    "cargo::warning=CUDA build: driver supports up to CUDA {}",
                    driver_cuda
                );
            }
            println!(
                "cargo::warning=If the build fails with 'Unsupported gpu architecture', \
                 your GPU needs a newer toolkit: https://developer.nvidia.com/cuda-downloads"
            );
            println!("cargo::warning=");
        }
        _ => {
            panic!(
                "\n\n\
                `nvcc` not found — the CUDA toolkit is not installed.\n\
                Install: https://developer.nvidia.com/cuda-downloads\n\
                Or build without CUDA: cargo build --release --features full\n",
            );
        }
    }
}

/// Parse "release X.Y" from nvcc --version output.
fn parse_cuda_version(text: &str) -> Option<(u32, u32)> {
    // nvcc output: "Cuda compilation tools, release 12.4, V12.4.131"
    let release_pos = text.find("release ")?;
    let after = &text[release_pos + 8..];
    let comma = after.find(',')?;
    let version_str = &after[..comma];
    let mut parts = version_str.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Get the CUDA version supported by the driver from nvidia-smi.
fn get_driver_cuda_version() -> Option<String> {
    let output = Command::new("nvidia-smi")
        .arg("--query-gpu=driver_version")
        .arg("--format=csv,noheader")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    // nvidia-smi header shows "CUDA Version: X.Y", parse it from full output
    let full_output = Command::new("nvidia-smi").output().ok()?;
    let text = String::from_utf8_lossy(&full_output.stdout);

    let cuda_pos = text.find("CUDA Version:")?;
    let after = &text[cuda_pos + 14..];
    let end = after.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    Some(after[..end].trim().to_string())
}
