//! CTC forced alignment over frame-level emissions.
//!
//! Implements the standard trellis construction and Viterbi backtrack for
//! aligning known text against CTC log-probabilities, then groups the best
//! path into per-word timings. Everything here is pure math so it can be
//! exercised without a model or an inference runtime.

use std::collections::HashMap;

use crate::error::{Result, VoxalignError};
use crate::transcript::WordAlignment;

/// Character-level CTC vocabulary.
#[derive(Debug, Clone)]
pub struct CtcVocab {
    chars: HashMap<char, usize>,
    blank_id: usize,
    word_sep_id: usize,
}

impl CtcVocab {
    pub fn new(chars: HashMap<char, usize>, blank_id: usize, word_sep_id: usize) -> Self {
        Self {
            chars,
            blank_id,
            word_sep_id,
        }
    }

    /// Build from a wav2vec2 `vocab.json` token map.
    ///
    /// The blank is the pad token. Multi-character entries other than the
    /// pad token are dropped; the word separator is `|` or a literal space,
    /// whichever the vocabulary carries.
    pub fn from_token_map(raw: &HashMap<String, usize>) -> Self {
        let blank_id = raw
            .get("<pad>")
            .or_else(|| raw.get("[pad]"))
            .copied()
            .unwrap_or(0);

        let mut chars = HashMap::new();
        for (token, &id) in raw {
            let mut it = token.chars();
            if let (Some(c), None) = (it.next(), it.next()) {
                chars.insert(c, id);
            }
        }

        let word_sep_id = chars
            .get(&'|')
            .or_else(|| chars.get(&' '))
            .copied()
            .unwrap_or(blank_id);

        Self {
            chars,
            blank_id,
            word_sep_id,
        }
    }

    pub fn blank_id(&self) -> usize {
        self.blank_id
    }

    pub fn word_sep_id(&self) -> usize {
        self.word_sep_id
    }

    /// Look up a character, falling back across cases so that text casing
    /// does not have to match the model vocabulary's.
    pub fn lookup(&self, c: char) -> Option<usize> {
        if let Some(&id) = self.chars.get(&c) {
            return Some(id);
        }
        if let Some(lower) = c.to_lowercase().next()
            && let Some(&id) = self.chars.get(&lower)
        {
            return Some(id);
        }
        if let Some(upper) = c.to_uppercase().next()
            && let Some(&id) = self.chars.get(&upper)
        {
            return Some(id);
        }
        None
    }
}

/// Text expanded into the blank-interleaved CTC label sequence.
#[derive(Debug)]
pub struct TokenSequence {
    ids: Vec<usize>,
    chars: Vec<Option<char>>,
}

impl TokenSequence {
    /// Expand `text` into `blank, char, blank, ..` with the word separator
    /// between words. Characters missing from the vocabulary are dropped.
    pub fn build(text: &str, vocab: &CtcVocab) -> Self {
        let mut ids = vec![vocab.blank_id()];
        let mut chars: Vec<Option<char>> = vec![None];

        for (wi, word) in text.split_whitespace().enumerate() {
            if wi > 0 {
                ids.push(vocab.word_sep_id());
                chars.push(Some('|'));
                ids.push(vocab.blank_id());
                chars.push(None);
            }
            for c in word.chars() {
                if let Some(id) = vocab.lookup(c) {
                    ids.push(id);
                    chars.push(Some(c));
                    ids.push(vocab.blank_id());
                    chars.push(None);
                }
            }
        }

        Self { ids, chars }
    }

    /// True when no vocabulary character survived tokenization.
    pub fn is_empty(&self) -> bool {
        !self
            .chars
            .iter()
            .any(|c| matches!(c, Some(ch) if *ch != '|'))
    }

    /// The fewest emission frames that can carry this sequence.
    pub fn min_frames(&self) -> usize {
        (self.ids.len() + 1) / 2
    }

    fn id(&self, state: usize) -> usize {
        self.ids[state]
    }

    fn char_at(&self, state: usize) -> Option<char> {
        self.chars[state]
    }

    fn states(&self) -> usize {
        self.ids.len()
    }
}

/// Frame-major matrix of per-token log-probabilities.
pub struct Emissions<'a> {
    data: &'a [f32],
    vocab_size: usize,
}

impl<'a> Emissions<'a> {
    pub fn new(data: &'a [f32], vocab_size: usize) -> Result<Self> {
        if vocab_size == 0 || !data.len().is_multiple_of(vocab_size) {
            return Err(VoxalignError::Inference {
                stage: "alignment".to_string(),
                message: format!(
                    "emission matrix of {} values does not divide into rows of {}",
                    data.len(),
                    vocab_size
                ),
            });
        }
        Ok(Self { data, vocab_size })
    }

    pub fn frames(&self) -> usize {
        self.data.len() / self.vocab_size
    }

    fn at(&self, frame: usize, token: usize) -> f32 {
        self.data[frame * self.vocab_size + token]
    }
}

/// Convert raw logits to log-probabilities, row by row.
pub fn log_softmax_rows(mut values: Vec<f32>, vocab_size: usize) -> Vec<f32> {
    if vocab_size == 0 {
        return values;
    }
    for row in values.chunks_mut(vocab_size) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let log_sum = row.iter().map(|v| (v - max).exp()).sum::<f32>().ln();
        for v in row.iter_mut() {
            *v = *v - max - log_sum;
        }
    }
    values
}

/// Align `text` against the emissions, producing one timing per word the
/// vocabulary can express. Word times are relative to frame zero.
pub fn align_emissions(
    emissions: &Emissions<'_>,
    text: &str,
    vocab: &CtcVocab,
    stride_secs: f32,
) -> Result<Vec<WordAlignment>> {
    let tokens = TokenSequence::build(text, vocab);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let frames = emissions.frames();
    if frames < tokens.min_frames() {
        return Err(VoxalignError::Inference {
            stage: "alignment".to_string(),
            message: format!(
                "audio too short for text: {} frames < {} required",
                frames,
                tokens.min_frames()
            ),
        });
    }

    let path = viterbi(emissions, &tokens);
    Ok(group_words(&path, &tokens, vocab, emissions, stride_secs))
}

/// Best monotonic path through the trellis as `(state, frame)` pairs.
///
/// Transitions follow CTC rules: stay, advance one state, or skip a blank
/// between two different characters.
fn viterbi(emissions: &Emissions<'_>, tokens: &TokenSequence) -> Vec<(usize, usize)> {
    let frames = emissions.frames();
    let states = tokens.states();

    let mut score = vec![f32::NEG_INFINITY; frames * states];
    let mut back = vec![0usize; frames * states];

    score[0] = emissions.at(0, tokens.id(0));
    if states > 1 {
        score[1] = emissions.at(0, tokens.id(1));
    }

    for t in 1..frames {
        for s in 0..states {
            let mut best = score[(t - 1) * states + s];
            let mut from = s;

            if s >= 1 {
                let step = score[(t - 1) * states + s - 1];
                if step > best {
                    best = step;
                    from = s - 1;
                }
            }
            if s >= 2 && tokens.id(s) != tokens.id(s - 2) {
                let skip = score[(t - 1) * states + s - 2];
                if skip > best {
                    best = skip;
                    from = s - 2;
                }
            }

            score[t * states + s] = best + emissions.at(t, tokens.id(s));
            back[t * states + s] = from;
        }
    }

    // End on the last token or its trailing blank, whichever scored higher.
    let mut s = states - 1;
    if states >= 2 && score[(frames - 1) * states + states - 2] > score[(frames - 1) * states + s] {
        s = states - 2;
    }

    let mut path = Vec::with_capacity(frames);
    path.push((s, frames - 1));
    for t in (1..frames).rev() {
        s = back[t * states + s];
        path.push((s, t - 1));
    }
    path.reverse();
    path
}

struct WordSpan {
    text: String,
    start_frame: usize,
    end_frame: usize,
    log_probs: Vec<f32>,
}

impl WordSpan {
    fn open(frame: usize) -> Self {
        Self {
            text: String::new(),
            start_frame: frame,
            end_frame: frame,
            log_probs: Vec::new(),
        }
    }

    fn into_alignment(self, stride_secs: f32) -> WordAlignment {
        let confidence = if self.log_probs.is_empty() {
            0.0
        } else {
            (self.log_probs.iter().sum::<f32>() / self.log_probs.len() as f32).exp()
        };
        WordAlignment {
            word: self.text,
            start: self.start_frame as f32 * stride_secs,
            end: (self.end_frame + 1) as f32 * stride_secs,
            confidence,
        }
    }
}

/// Group the best path into words. A state held across several frames is
/// one character occurrence, not a repeat.
fn group_words(
    path: &[(usize, usize)],
    tokens: &TokenSequence,
    vocab: &CtcVocab,
    emissions: &Emissions<'_>,
    stride_secs: f32,
) -> Vec<WordAlignment> {
    let mut words = Vec::new();
    let mut current: Option<WordSpan> = None;
    let mut prev_state = usize::MAX;

    for &(state, frame) in path {
        let id = tokens.id(state);

        if id == vocab.blank_id() {
            prev_state = state;
            continue;
        }
        if id == vocab.word_sep_id() {
            if let Some(span) = current.take() {
                words.push(span.into_alignment(stride_secs));
            }
            prev_state = state;
            continue;
        }

        let held = state == prev_state;
        prev_state = state;

        let span = current.get_or_insert_with(|| WordSpan::open(frame));
        if !held && let Some(c) = tokens.char_at(state) {
            span.text.push(c);
        }
        span.end_frame = frame;
        span.log_probs.push(emissions.at(frame, id));
    }

    if let Some(span) = current.take() {
        words.push(span.into_alignment(stride_secs));
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRIDE: f32 = 0.02;

    fn test_vocab() -> CtcVocab {
        let raw: HashMap<String, usize> = [("<pad>", 0), ("|", 1), ("a", 2), ("b", 3)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        CtcVocab::from_token_map(&raw)
    }

    /// Rows of 4 log-probs peaked at one token per frame.
    fn peaked(peaks: &[usize]) -> Vec<f32> {
        let mut data = Vec::with_capacity(peaks.len() * 4);
        for &peak in peaks {
            for token in 0..4 {
                data.push(if token == peak { 0.0 } else { -10.0 });
            }
        }
        data
    }

    #[test]
    fn from_token_map_picks_blank_and_separator() {
        let vocab = test_vocab();
        assert_eq!(vocab.blank_id(), 0);
        assert_eq!(vocab.word_sep_id(), 1);
        assert_eq!(vocab.lookup('a'), Some(2));
        assert_eq!(vocab.lookup('z'), None);
    }

    #[test]
    fn lookup_falls_back_across_cases() {
        let raw: HashMap<String, usize> = [("<pad>", 0), ("|", 1), ("A", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let vocab = CtcVocab::from_token_map(&raw);

        assert_eq!(vocab.lookup('a'), Some(2));
        assert_eq!(vocab.lookup('A'), Some(2));
    }

    #[test]
    fn space_separated_vocab_uses_space_as_separator() {
        let raw: HashMap<String, usize> = [("<pad>", 0), (" ", 5), ("a", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let vocab = CtcVocab::from_token_map(&raw);

        assert_eq!(vocab.word_sep_id(), 5);
    }

    #[test]
    fn token_sequence_interleaves_blanks() {
        let tokens = TokenSequence::build("ab a", &test_vocab());

        // blank a blank b blank | blank a blank
        assert_eq!(tokens.ids, vec![0, 2, 0, 3, 0, 1, 0, 2, 0]);
        assert_eq!(tokens.min_frames(), 5);
        assert!(!tokens.is_empty());
    }

    #[test]
    fn token_sequence_without_known_chars_is_empty() {
        let tokens = TokenSequence::build("!?", &test_vocab());
        assert!(tokens.is_empty());
    }

    #[test]
    fn single_word_alignment() {
        let vocab = test_vocab();
        let data = peaked(&[2, 2, 3, 3]);
        let emissions = Emissions::new(&data, 4).unwrap();

        let words = align_emissions(&emissions, "ab", &vocab, STRIDE).unwrap();

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "ab");
        assert!((words[0].start - 0.0).abs() < 1e-6);
        assert!((words[0].end - 4.0 * STRIDE).abs() < 1e-6);
        assert!((words[0].confidence - 1.0).abs() < 1e-3);
    }

    #[test]
    fn held_state_does_not_duplicate_characters() {
        let vocab = test_vocab();
        // 'a' held for three frames, then 'b'
        let data = peaked(&[2, 2, 2, 3]);
        let emissions = Emissions::new(&data, 4).unwrap();

        let words = align_emissions(&emissions, "ab", &vocab, STRIDE).unwrap();

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "ab");
    }

    #[test]
    fn words_split_on_the_separator() {
        let vocab = test_vocab();
        let data = peaked(&[2, 2, 1, 3, 3]);
        let emissions = Emissions::new(&data, 4).unwrap();

        let words = align_emissions(&emissions, "a b", &vocab, STRIDE).unwrap();

        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "a");
        assert_eq!(words[1].word, "b");
        assert!(words[0].end <= words[1].start + 1e-6);
        assert!((words[1].start - 3.0 * STRIDE).abs() < 1e-6);
        assert!((words[1].end - 5.0 * STRIDE).abs() < 1e-6);
    }

    #[test]
    fn double_letters_need_a_blank_between() {
        let vocab = test_vocab();
        let data = peaked(&[2, 0, 2]);
        let emissions = Emissions::new(&data, 4).unwrap();

        let words = align_emissions(&emissions, "aa", &vocab, STRIDE).unwrap();

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "aa");
    }

    #[test]
    fn unknown_characters_are_dropped_from_words() {
        let vocab = test_vocab();
        let data = peaked(&[2, 2]);
        let emissions = Emissions::new(&data, 4).unwrap();

        let words = align_emissions(&emissions, "a!", &vocab, STRIDE).unwrap();

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "a");
    }

    #[test]
    fn empty_text_aligns_to_nothing() {
        let vocab = test_vocab();
        let data = peaked(&[0, 0]);
        let emissions = Emissions::new(&data, 4).unwrap();

        assert!(align_emissions(&emissions, "", &vocab, STRIDE)
            .unwrap()
            .is_empty());
        assert!(align_emissions(&emissions, "  ", &vocab, STRIDE)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn too_few_frames_is_an_error() {
        let vocab = test_vocab();
        let data = peaked(&[2, 3]);
        let emissions = Emissions::new(&data, 4).unwrap();

        // "ab" needs at least 3 frames
        let result = align_emissions(&emissions, "ab", &vocab, STRIDE);
        assert!(matches!(result, Err(VoxalignError::Inference { .. })));
    }

    #[test]
    fn emission_rows_must_divide_evenly() {
        let data = vec![0.0; 7];
        assert!(Emissions::new(&data, 4).is_err());
        assert!(Emissions::new(&data, 0).is_err());
    }

    #[test]
    fn log_softmax_rows_normalize() {
        let values = log_softmax_rows(vec![1.0, 2.0, 3.0, 0.5, 0.5, 0.5], 3);

        for row in values.chunks(3) {
            let sum: f32 = row.iter().map(|v| v.exp()).sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        // Largest logit keeps the largest probability
        assert!(values[2] > values[1] && values[1] > values[0]);
    }
}
