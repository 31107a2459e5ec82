//! In-memory audio buffers.

use crate::error::{Result, VoxalignError};

/// Decoded audio samples together with their format.
///
/// Multi-channel audio is interleaved frame by frame: the buffer for two
/// channels holds `[l0, r0, l1, r1, ..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Create a buffer, rejecting formats no stage can work with.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VoxalignError::AudioRead {
                message: "sample rate must be positive".to_string(),
            });
        }
        if channels == 0 {
            return Err(VoxalignError::AudioRead {
                message: "channel count must be positive".to_string(),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Create a buffer already known to be mono.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, sample_rate, 1)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the buffer in seconds.
    pub fn duration_secs(&self) -> f32 {
        let frames = self.samples.len() / self.channels as usize;
        frames as f32 / self.sample_rate as f32
    }

    /// Reduce to mono by keeping the first channel of every frame.
    ///
    /// Channels beyond the first are discarded, not mixed in. Mono input
    /// passes through unchanged.
    pub fn first_channel(self) -> Self {
        if self.channels == 1 {
            return self;
        }
        let samples = self
            .samples
            .iter()
            .step_by(self.channels as usize)
            .copied()
            .collect();
        Self {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }
}
