//! Per-segment alignment driver.

use crate::align::backend::{AlignBackend, AlignProvider};
use crate::audio::AudioBuffer;
use crate::config::Device;
use crate::error::Result;
use crate::transcript::{AlignedSegment, Segment};

/// Aligns recognized segments against the audio they came from.
///
/// Holding the engine holds the loaded model; drop it to release the model.
pub struct AlignmentEngine {
    backend: Box<dyn AlignBackend>,
}

impl AlignmentEngine {
    /// Load the alignment model for `language` through `provider`.
    pub fn load(provider: &dyn AlignProvider, language: &str, device: Device) -> Result<Self> {
        let backend = provider.load(language, device)?;
        log::info!("loaded alignment model for '{}'", backend.language());
        Ok(Self { backend })
    }

    pub fn language(&self) -> &str {
        self.backend.language()
    }

    /// Align every segment against its span of `audio`.
    ///
    /// The output matches the input segment for segment, in order. A
    /// segment whose span falls outside the buffer or whose text holds no
    /// words comes back with an empty word list; word times are absolute.
    pub fn align(&self, segments: &[Segment], audio: &AudioBuffer) -> Result<Vec<AlignedSegment>> {
        let samples = audio.samples();
        let rate = audio.sample_rate() as f32;

        let mut aligned = Vec::with_capacity(segments.len());
        for segment in segments {
            let begin = ((segment.start * rate) as usize).min(samples.len());
            let end = ((segment.end * rate) as usize)
                .min(samples.len())
                .max(begin);
            let span = &samples[begin..end];

            if span.is_empty() || segment.text.split_whitespace().next().is_none() {
                aligned.push(AlignedSegment::from_segment(segment.clone(), Vec::new()));
                continue;
            }

            let mut words = self.backend.align_span(span, &segment.text)?;
            for word in &mut words {
                word.start += segment.start;
                word.end += segment.start;
            }

            aligned.push(AlignedSegment::from_segment(segment.clone(), words));
        }

        Ok(aligned)
    }
}
