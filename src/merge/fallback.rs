//! Text-only merge for results without word timings.
//!
//! Without timestamps the overlap between adjacent chunks can only be found
//! lexically: the tail of the accumulated text and the head of the incoming
//! text are compared token-by-token, case-folded and stripped of ASCII
//! punctuation. Normalization is used for comparison only; the emitted text
//! keeps the original bytes.

use super::{MergeDiagnostics, MergedTranscript};
use crate::transcription::models::TranscriptionResult;
use tracing::debug;

/// Fraction of each side searched for the duplicated run.
const SEARCH_FRACTION: f64 = 0.3;

/// Shortest duplicated run worth stripping.
const MIN_RUN_TOKENS: usize = 2;

/// Concatenates chunk texts, removing the duplicated run at each seam.
pub fn merge_text_only(results: &[TranscriptionResult]) -> MergedTranscript {
    let mut merged = String::new();

    for result in results {
        let TranscriptionResult::Success { text, .. } = result else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        if merged.is_empty() {
            merged.push_str(text);
            continue;
        }

        let overlap = overlap_run(&merged, text);
        if overlap > 0 {
            debug!("Stripping {} duplicated tokens at seam", overlap);
        }
        let rest = skip_tokens(text, overlap);
        if !rest.is_empty() {
            merged.push(' ');
            merged.push_str(rest);
        }
    }

    MergedTranscript {
        text: merged,
        words: Vec::new(),
        diagnostics: MergeDiagnostics::default(),
    }
}

/// Longest matching token run between `merged`'s tail and `incoming`'s head.
///
/// Returns the number of tokens to strip from `incoming`, or 0 when the
/// best run is too short to be a real overlap.
fn overlap_run(merged: &str, incoming: &str) -> usize {
    let tail: Vec<&str> = merged.split_whitespace().collect();
    let head: Vec<&str> = incoming.split_whitespace().collect();
    if tail.is_empty() || head.is_empty() {
        return 0;
    }

    let tail_window = window_len(tail.len());
    let head_window = window_len(head.len());
    let tail_slice = &tail[tail.len() - tail_window..];
    let head_slice = &head[..head_window];

    let mut best = 0;
    for start in 0..tail_slice.len() {
        let mut run = 0;
        while start + run < tail_slice.len()
            && run < head_slice.len()
            && tokens_match(tail_slice[start + run], head_slice[run])
        {
            run += 1;
        }
        if run > best {
            best = run;
        }
    }

    if best >= MIN_RUN_TOKENS {
        best
    } else {
        0
    }
}

fn window_len(total: usize) -> usize {
    ((total as f64 * SEARCH_FRACTION).ceil() as usize).clamp(1, total)
}

fn tokens_match(a: &str, b: &str) -> bool {
    let a = normalize(a);
    !a.is_empty() && a == normalize(b)
}

/// Case-folds and strips ASCII punctuation. Comparison only, never output.
fn normalize(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Returns `text` with its first `n` whitespace-separated tokens removed,
/// preserving the original bytes of the remainder.
fn skip_tokens(text: &str, n: usize) -> &str {
    if n == 0 {
        return text;
    }
    let mut seen = 0;
    let mut in_token = false;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_token = false;
        } else if !in_token {
            in_token = true;
            seen += 1;
            if seen == n + 1 {
                return &text[i..];
            }
        }
    }
    ""
}
