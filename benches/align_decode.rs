use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::HashMap;
use voxalign::align::decode::{CtcVocab, Emissions, align_emissions, log_softmax_rows};

const STRIDE_SECS: f32 = 0.02;

/// a-z plus pad and word separator, matching a wav2vec2 character vocabulary.
fn letters_vocab() -> (CtcVocab, usize) {
    let mut raw: HashMap<String, usize> = HashMap::new();
    raw.insert("<pad>".to_string(), 0);
    raw.insert("|".to_string(), 1);
    for (i, c) in ('a'..='z').enumerate() {
        raw.insert(c.to_string(), i + 2);
    }
    let vocab_size = raw.len();
    (CtcVocab::from_token_map(&raw), vocab_size)
}

/// Synthetic emissions that peak on each character of `text` in order,
/// spread evenly over `frames`, with blanks filling the gaps.
fn synthetic_emissions(text: &str, vocab: &CtcVocab, vocab_size: usize, frames: usize) -> Vec<f32> {
    let ids: Vec<usize> = text
        .chars()
        .map(|c| {
            if c == ' ' {
                vocab.word_sep_id()
            } else {
                vocab.lookup(c).unwrap_or(vocab.blank_id())
            }
        })
        .collect();

    let mut logits = vec![0.0f32; frames * vocab_size];
    for t in 0..frames {
        let idx = (t * ids.len()) / frames;
        let id = if t % 2 == 0 { ids[idx] } else { vocab.blank_id() };
        logits[t * vocab_size + id] = 8.0;
    }
    log_softmax_rows(logits, vocab_size)
}

fn bench_align_emissions(c: &mut Criterion) {
    let (vocab, vocab_size) = letters_vocab();
    let text = "the quick brown fox jumps over the lazy dog";

    let mut group = c.benchmark_group("align_emissions");
    // 1s / 5s / 15s of audio at a 20 ms frame stride
    for frames in [50usize, 250, 750] {
        let data = synthetic_emissions(text, &vocab, vocab_size, frames);
        group.bench_with_input(BenchmarkId::from_parameter(frames), &frames, |b, _| {
            b.iter(|| {
                let emissions = Emissions::new(black_box(&data), vocab_size)
                    .expect("emissions shape is valid");
                align_emissions(&emissions, black_box(text), &vocab, STRIDE_SECS)
                    .expect("alignment of matching text succeeds")
            })
        });
    }
    group.finish();
}

fn bench_log_softmax(c: &mut Criterion) {
    let vocab_size = 32;
    let frames = 750;
    let logits: Vec<f32> = (0..frames * vocab_size)
        .map(|i| ((i * 31) % 97) as f32 / 10.0)
        .collect();

    c.bench_function("log_softmax_rows_750x32", |b| {
        b.iter(|| log_softmax_rows(black_box(logits.clone()), vocab_size))
    });
}

criterion_group!(benches, bench_align_emissions, bench_log_softmax);
criterion_main!(benches);
