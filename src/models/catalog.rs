//! Model metadata catalogs.
//!
//! Two catalogs live here: the Whisper recognition models (ggml files under
//! the recognition model root) and the per-language wav2vec2 alignment
//! models (ONNX exports under the alignment model root). The pipeline only
//! resolves paths from these tables; fetching the files is the deployment's
//! job.

use crate::defaults;

/// Metadata for a recognition model.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrModelInfo {
    /// Model identifier (e.g., "tiny.en", "base", "large-v2")
    pub name: &'static str,
    /// Model size in megabytes
    pub size_mb: u32,
    /// Whether this model supports English only
    pub english_only: bool,
}

/// Catalog of recognition models.
///
/// Models range from tiny (75 MB, fast, lower accuracy) to large-v3
/// (3094 MB, slower, highest accuracy). The `.en` suffix indicates
/// English-only models, which are faster at the same size.
pub const ASR_MODELS: &[AsrModelInfo] = &[
    AsrModelInfo {
        name: "tiny.en",
        size_mb: 75,
        english_only: true,
    },
    AsrModelInfo {
        name: "tiny",
        size_mb: 75,
        english_only: false,
    },
    AsrModelInfo {
        name: "base.en",
        size_mb: 142,
        english_only: true,
    },
    AsrModelInfo {
        name: "base",
        size_mb: 142,
        english_only: false,
    },
    AsrModelInfo {
        name: "small.en",
        size_mb: 466,
        english_only: true,
    },
    AsrModelInfo {
        name: "small",
        size_mb: 466,
        english_only: false,
    },
    AsrModelInfo {
        name: "medium.en",
        size_mb: 1533,
        english_only: true,
    },
    AsrModelInfo {
        name: "medium",
        size_mb: 1533,
        english_only: false,
    },
    AsrModelInfo {
        name: "large-v2",
        size_mb: 3094,
        english_only: false,
    },
    AsrModelInfo {
        name: "large-v3",
        size_mb: 3095,
        english_only: false,
    },
];

/// Metadata for a per-language alignment model.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignModelInfo {
    /// Two-letter language code the model aligns
    pub language: &'static str,
    /// Upstream model identifier the on-disk directory name derives from
    pub model_id: &'static str,
}

impl AlignModelInfo {
    /// Directory name under the alignment model root, derived from the
    /// upstream identifier with `/` flattened to `--`.
    pub fn dir_name(&self) -> String {
        self.model_id.replace('/', "--")
    }
}

/// Catalog of alignment models, one per supported language.
pub const ALIGN_MODELS: &[AlignModelInfo] = &[
    AlignModelInfo {
        language: "en",
        model_id: "facebook/wav2vec2-base-960h",
    },
    AlignModelInfo {
        language: "es",
        model_id: "facebook/wav2vec2-base-10k-voxpopuli-ft-es",
    },
    AlignModelInfo {
        language: "fr",
        model_id: "facebook/wav2vec2-base-10k-voxpopuli-ft-fr",
    },
    AlignModelInfo {
        language: "de",
        model_id: "facebook/wav2vec2-base-10k-voxpopuli-ft-de",
    },
    AlignModelInfo {
        language: "it",
        model_id: "facebook/wav2vec2-base-10k-voxpopuli-ft-it",
    },
    AlignModelInfo {
        language: "ja",
        model_id: "jonatasgrosman/wav2vec2-large-xlsr-53-japanese",
    },
    AlignModelInfo {
        language: "zh",
        model_id: "jonatasgrosman/wav2vec2-large-xlsr-53-chinese-zh-cn",
    },
    AlignModelInfo {
        language: "nl",
        model_id: "jonatasgrosman/wav2vec2-large-xlsr-53-dutch",
    },
    AlignModelInfo {
        language: "uk",
        model_id: "Yehor/wav2vec2-xls-r-300m-uk-with-small-lm",
    },
    AlignModelInfo {
        language: "pt",
        model_id: "jonatasgrosman/wav2vec2-large-xlsr-53-portuguese",
    },
];

/// Find a recognition model by name.
pub fn get_asr_model(name: &str) -> Option<&'static AsrModelInfo> {
    ASR_MODELS.iter().find(|m| m.name == name)
}

/// Get all recognition models.
pub fn list_asr_models() -> &'static [AsrModelInfo] {
    ASR_MODELS
}

/// Get the default recognition model.
///
/// The default is `large-v2`: multilingual, and accurate enough that the
/// alignment stage downstream is not fed garbage.
pub fn default_asr_model() -> &'static AsrModelInfo {
    get_asr_model(defaults::DEFAULT_ASR_MODEL)
        .expect("default recognition model should always be present in catalog")
}

/// Find the alignment model for a language code.
///
/// Returns `None` for languages outside the supported set; callers turn
/// that into an unsupported-language error.
pub fn align_model_for(language: &str) -> Option<&'static AlignModelInfo> {
    ALIGN_MODELS.iter().find(|m| m.language == language)
}

/// Get all alignment models.
pub fn list_align_models() -> &'static [AlignModelInfo] {
    ALIGN_MODELS
}

/// ggml file name for a recognition model (e.g., "ggml-large-v2.bin").
pub fn ggml_file_name(model: &str) -> String {
    format!("ggml-{model}.bin")
}

/// ggml file name of the 8-bit quantized variant
/// (e.g., "ggml-large-v2-q8_0.bin").
pub fn ggml_file_name_quantized(model: &str) -> String {
    format!("ggml-{model}-q8_0.bin")
}
