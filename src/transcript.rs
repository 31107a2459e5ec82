//! Transcript data model: recognized segments, word-level timings, and
//! final text assembly.

use serde::{Deserialize, Serialize};

/// A span of recognized speech with absolute timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

/// A single word with its aligned time span and alignment confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordAlignment {
    pub word: String,
    pub start: f32,
    pub end: f32,
    /// Confidence in [0, 1]: exp of the mean per-frame log-probability
    /// along the aligned path.
    pub confidence: f32,
}

/// A recognized segment enriched with word-level timings.
///
/// `words` may be empty: spans the alignment vocabulary cannot express
/// still carry their segment through to assembly unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSegment {
    pub start: f32,
    pub end: f32,
    pub text: String,
    pub words: Vec<WordAlignment>,
}

impl AlignedSegment {
    /// Wrap a recognized segment with its word alignments.
    pub fn from_segment(segment: Segment, words: Vec<WordAlignment>) -> Self {
        Self {
            start: segment.start,
            end: segment.end,
            text: segment.text,
            words,
        }
    }
}

/// Final pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Segment texts joined in order with single spaces, untrimmed.
    pub text: String,
    /// Resolved language code: the requested language, or the detected one
    /// when the request said "auto".
    pub language: String,
    pub segments: Vec<AlignedSegment>,
}

/// Join aligned segment texts with a single space separator.
///
/// Texts are joined exactly as recognition produced them; whitespace inside
/// each text is preserved, nothing is trimmed.
pub fn assemble(segments: &[AlignedSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned(text: &str) -> AlignedSegment {
        AlignedSegment {
            start: 0.0,
            end: 1.0,
            text: text.to_string(),
            words: Vec::new(),
        }
    }

    #[test]
    fn assemble_empty_input_yields_empty_string() {
        assert_eq!(assemble(&[]), "");
    }

    #[test]
    fn assemble_single_segment_is_exact_text() {
        assert_eq!(assemble(&[aligned("hello world")]), "hello world");
    }

    #[test]
    fn assemble_joins_with_single_space() {
        let segments = [aligned("first part."), aligned("second part.")];
        assert_eq!(assemble(&segments), "first part. second part.");
    }

    #[test]
    fn assemble_preserves_segment_whitespace() {
        // Recognition often emits leading spaces; they pass through untouched.
        let segments = [aligned(" hello"), aligned(" world ")];
        assert_eq!(assemble(&segments), " hello  world ");
    }

    #[test]
    fn from_segment_carries_all_fields() {
        let segment = Segment {
            start: 1.5,
            end: 3.0,
            text: "ciao".to_string(),
        };
        let words = vec![WordAlignment {
            word: "ciao".to_string(),
            start: 1.6,
            end: 2.1,
            confidence: 0.93,
        }];
        let aligned = AlignedSegment::from_segment(segment, words.clone());
        assert_eq!(aligned.start, 1.5);
        assert_eq!(aligned.end, 3.0);
        assert_eq!(aligned.text, "ciao");
        assert_eq!(aligned.words, words);
    }
}
