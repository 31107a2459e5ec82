//! Recognition backend seams.
//!
//! `AsrProvider` loads a model onto a device; the loaded `AsrBackend`
//! recognizes batches of audio windows. The traits allow swapping
//! implementations (real Whisper vs mock).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{ComputeType, Device};
use crate::error::{Result, VoxalignError};
use crate::transcript::Segment;

/// Recognition output for one batch of windows.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTranscription {
    /// Segments per window, in window order, with window-relative times.
    pub windows: Vec<Vec<Segment>>,
    /// Language the batch was recognized in.
    pub language: String,
}

/// Trait for a loaded recognition model.
pub trait AsrBackend: Send + Sync {
    /// Recognize a batch of audio windows at the canonical sample rate.
    ///
    /// Every window in the batch is handed to the model together. A
    /// `language` of `None` asks the backend to detect; the resolved
    /// language comes back on the result either way.
    fn transcribe_batch(
        &self,
        windows: &[&[f32]],
        language: Option<&str>,
    ) -> Result<BatchTranscription>;

    /// Name of the loaded model.
    fn model_name(&self) -> &str;
}

/// Implement AsrBackend for Arc<T> to allow shared backends.
impl<T: AsrBackend> AsrBackend for Arc<T> {
    fn transcribe_batch(
        &self,
        windows: &[&[f32]],
        language: Option<&str>,
    ) -> Result<BatchTranscription> {
        (**self).transcribe_batch(windows, language)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Trait for loading recognition models onto a device.
pub trait AsrProvider: Send + Sync {
    /// Load `model` onto `device` at `compute_type` precision.
    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: ComputeType,
    ) -> Result<Box<dyn AsrBackend>>;
}

/// Implement AsrProvider for Arc<T> so tests can keep a handle to a mock
/// after handing it to the pipeline.
impl<T: AsrProvider> AsrProvider for Arc<T> {
    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: ComputeType,
    ) -> Result<Box<dyn AsrBackend>> {
        (**self).load(model, device, compute_type)
    }
}

/// Mock recognition backend for testing.
///
/// Responses are queued per window: each recognized window pops one entry,
/// and an empty queue yields windows with no segments (silence).
pub struct MockAsrBackend {
    model_name: String,
    responses: Mutex<VecDeque<Vec<Segment>>>,
    language: String,
    should_fail: bool,
    call_hook: Option<Box<dyn Fn() + Send + Sync>>,
    batch_sizes: Mutex<Vec<usize>>,
    requested_languages: Mutex<Vec<Option<String>>>,
}

impl MockAsrBackend {
    /// Create a new mock backend that recognizes silence everywhere.
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            responses: Mutex::new(VecDeque::new()),
            language: "en".to_string(),
            should_fail: false,
            call_hook: None,
            batch_sizes: Mutex::new(Vec::new()),
            requested_languages: Mutex::new(Vec::new()),
        }
    }

    /// Queue the segments one recognized window will return.
    pub fn with_window(self, segments: Vec<Segment>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(segments);
        self
    }

    /// Queue a window holding a single segment spanning `start..end`.
    pub fn with_text(self, text: &str, start: f32, end: f32) -> Self {
        self.with_window(vec![Segment {
            start,
            end,
            text: text.to_string(),
        }])
    }

    /// Configure the language the mock reports as detected.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Configure the mock to fail on recognition.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Run `hook` at the start of every recognition call. Used to flip
    /// cancellation mid-pipeline.
    pub fn with_call_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.call_hook = Some(Box::new(hook));
        self
    }

    /// Window counts of each recognition call, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Language argument of each recognition call, in call order.
    pub fn requested_languages(&self) -> Vec<Option<String>> {
        self.requested_languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AsrBackend for MockAsrBackend {
    fn transcribe_batch(
        &self,
        windows: &[&[f32]],
        language: Option<&str>,
    ) -> Result<BatchTranscription> {
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(windows.len());
        self.requested_languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(language.map(str::to_string));

        if let Some(hook) = &self.call_hook {
            hook();
        }

        if self.should_fail {
            return Err(VoxalignError::Inference {
                stage: "transcription".to_string(),
                message: "mock recognition failure".to_string(),
            });
        }

        let mut queue = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let out = windows
            .iter()
            .map(|_| queue.pop_front().unwrap_or_default())
            .collect();

        Ok(BatchTranscription {
            windows: out,
            language: language.unwrap_or(&self.language).to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Mock provider for testing: records loads and shares one backend.
pub struct MockAsrProvider {
    backend: Arc<MockAsrBackend>,
    loads: Mutex<Vec<(String, Device, ComputeType)>>,
    should_fail: bool,
}

impl MockAsrProvider {
    pub fn new(backend: MockAsrBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            loads: Mutex::new(Vec::new()),
            should_fail: false,
        }
    }

    /// Configure the provider to fail on load.
    pub fn with_load_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Shared handle to the backend, for inspecting recorded calls.
    pub fn backend(&self) -> Arc<MockAsrBackend> {
        Arc::clone(&self.backend)
    }

    /// Recorded load requests, in call order.
    pub fn loads(&self) -> Vec<(String, Device, ComputeType)> {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AsrProvider for MockAsrProvider {
    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: ComputeType,
    ) -> Result<Box<dyn AsrBackend>> {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((model.to_string(), device, compute_type));

        if self.should_fail {
            return Err(VoxalignError::ModelLoad {
                model: model.to_string(),
                message: "mock load failure".to_string(),
            });
        }

        Ok(Box::new(Arc::clone(&self.backend)))
    }
}
