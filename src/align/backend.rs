//! Alignment backend traits and test doubles.
//!
//! An AlignProvider loads one alignment model per language; the resulting
//! AlignBackend aligns transcript text against raw samples. Mock
//! implementations let the engine and pipeline be tested without model
//! files or an inference runtime.

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Device;
use crate::defaults;
use crate::error::{Result, VoxalignError};
use crate::transcript::WordAlignment;

/// A loaded alignment model for a single language.
pub trait AlignBackend: Send + Sync {
    /// Align `text` against `samples`, returning word timings relative to
    /// the start of `samples`.
    fn align_span(&self, samples: &[f32], text: &str) -> Result<Vec<WordAlignment>>;

    /// The language this model aligns.
    fn language(&self) -> &str;
}

impl<T: AlignBackend + ?Sized> AlignBackend for Arc<T> {
    fn align_span(&self, samples: &[f32], text: &str) -> Result<Vec<WordAlignment>> {
        (**self).align_span(samples, text)
    }

    fn language(&self) -> &str {
        (**self).language()
    }
}

/// Loads alignment models by language.
pub trait AlignProvider: Send + Sync {
    fn load(&self, language: &str, device: Device) -> Result<Box<dyn AlignBackend>>;
}

impl<T: AlignProvider + ?Sized> AlignProvider for Arc<T> {
    fn load(&self, language: &str, device: Device) -> Result<Box<dyn AlignBackend>> {
        (**self).load(language, device)
    }
}

/// An AlignBackend that spreads words evenly across the span.
pub struct MockAlignBackend {
    language: String,
    should_fail: bool,
    aligned_texts: Mutex<Vec<String>>,
}

impl MockAlignBackend {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            should_fail: false,
            aligned_texts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failure(language: &str) -> Self {
        Self {
            should_fail: true,
            ..Self::new(language)
        }
    }

    /// Texts passed to align_span, in call order.
    pub fn aligned_texts(&self) -> Vec<String> {
        self.aligned_texts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AlignBackend for MockAlignBackend {
    fn align_span(&self, samples: &[f32], text: &str) -> Result<Vec<WordAlignment>> {
        self.aligned_texts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());

        if self.should_fail {
            return Err(VoxalignError::Inference {
                stage: "alignment".to_string(),
                message: "mock alignment failure".to_string(),
            });
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let duration = samples.len() as f32 / defaults::SAMPLE_RATE as f32;
        let slot = duration / words.len() as f32;

        Ok(words
            .iter()
            .enumerate()
            .map(|(i, word)| WordAlignment {
                word: word.to_string(),
                start: i as f32 * slot,
                end: (i + 1) as f32 * slot,
                confidence: 0.9,
            })
            .collect())
    }

    fn language(&self) -> &str {
        &self.language
    }
}

/// An AlignProvider wrapping a single shared MockAlignBackend.
pub struct MockAlignProvider {
    backend: Arc<MockAlignBackend>,
    supported: Vec<String>,
    loads: Mutex<Vec<String>>,
}

impl MockAlignProvider {
    /// Provider that accepts every catalog language.
    pub fn new(backend: MockAlignBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            supported: defaults::SUPPORTED_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
            loads: Mutex::new(Vec::new()),
        }
    }

    /// Restrict the provider to the given languages.
    pub fn with_supported(mut self, languages: &[&str]) -> Self {
        self.supported = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn backend(&self) -> &Arc<MockAlignBackend> {
        &self.backend
    }

    /// Languages requested through load, in call order.
    pub fn loads(&self) -> Vec<String> {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AlignProvider for MockAlignProvider {
    fn load(&self, language: &str, _device: Device) -> Result<Box<dyn AlignBackend>> {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(language.to_string());

        if !self.supported.iter().any(|l| l == language) {
            return Err(VoxalignError::UnsupportedLanguage {
                language: language.to_string(),
            });
        }

        Ok(Box::new(Arc::clone(&self.backend)))
    }
}
