//! WAV file reading and writing.
//!
//! Reads preserve the source rate and channel layout; the mono policy lives
//! with the ingestor, not here. Writes always emit 16-bit PCM.

use std::io::Read;
use std::path::Path;

use crate::audio::buffer::AudioBuffer;
use crate::error::{Result, VoxalignError};

/// Read a WAV file, preserving its rate and channel layout.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = hound::WavReader::open(path).map_err(|e| VoxalignError::AudioRead {
        message: format!("Failed to parse WAV file {}: {}", path.display(), e),
    })?;
    decode(reader)
}

/// Read WAV data from any reader (stdin pipe mode, tests).
pub fn read_wav_from<R: Read>(reader: R) -> Result<AudioBuffer> {
    let reader = hound::WavReader::new(reader).map_err(|e| VoxalignError::AudioRead {
        message: format!("Failed to parse WAV data: {}", e),
    })?;
    decode(reader)
}

fn decode<R: Read>(mut reader: hound::WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VoxalignError::AudioRead {
                message: format!("Failed to read WAV samples: {}", e),
            })?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VoxalignError::AudioRead {
                    message: format!("Failed to read WAV samples: {}", e),
                })?
        }
    };

    AudioBuffer::new(samples, spec.sample_rate, spec.channels)
}

/// Write a buffer as 16-bit PCM WAV at its native rate and channel layout.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| {
        VoxalignError::AudioConversion {
            message: format!("Failed to create WAV file {}: {}", path.display(), e),
        }
    })?;

    for &sample in buffer.samples() {
        let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(clamped)
            .map_err(|e| VoxalignError::AudioConversion {
                message: format!("Failed to write WAV samples: {}", e),
            })?;
    }

    writer.finalize().map_err(|e| VoxalignError::AudioConversion {
        message: format!("Failed to finalize WAV file: {}", e),
    })?;

    Ok(())
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as f32
            }
        })
        .collect()
}
