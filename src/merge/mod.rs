//! Transcript merging: overlap deduplication anchored on word timestamps.
//!
//! Adjacent chunks are extracted with overlapping ranges, so words near a
//! boundary appear in two chunks. For every adjacent pair the merger finds
//! the duplicated region, scores both renditions by how central their words
//! sit inside their own chunk's logical span, and keeps the more central
//! set intact. Word order within a chunk is never changed and there is no
//! global sort by timestamp; services occasionally return slightly
//! out-of-order timings and a global sort would interleave phrases.

mod fallback;

pub use fallback::merge_text_only;

use crate::planner::Chunk;
use crate::transcription::models::{TranscriptionResult, Word};
use serde::Serialize;
use tracing::{debug, instrument};

/// Slack when slicing overlap word runs, absorbing timestamp jitter.
const OVERLAP_SLICE_TOLERANCE: f64 = 0.1;

/// A word anchored to absolute recording time.
#[derive(Debug, Clone, Serialize)]
pub struct AnchoredWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(skip)]
    pub centrality: f64,
}

/// Counters describing what the merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeDiagnostics {
    /// Adjacent pairs whose word ranges actually overlapped.
    pub overlaps_merged: usize,
    /// Words discarded as the non-authoritative side of an overlap.
    pub words_dropped: usize,
    /// Words in the final stream.
    pub words_emitted: usize,
}

/// The reconstructed transcript.
#[derive(Debug, Clone, Serialize)]
pub struct MergedTranscript {
    pub text: String,
    pub words: Vec<AnchoredWord>,
    pub diagnostics: MergeDiagnostics,
}

/// Per-chunk word list with trim marks; words outside `keep_from..keep_to`
/// lost their overlap to the neighbor.
struct ChunkWords {
    words: Vec<AnchoredWord>,
    keep_from: usize,
    keep_to: usize,
}

impl ChunkWords {
    fn retained(&self) -> &[AnchoredWord] {
        &self.words[self.keep_from..self.keep_to]
    }
}

/// Folds per-chunk results into one word stream.
///
/// Only `Success` results with word timings participate; when none carry
/// timings the text-only fallback merge is used instead.
#[instrument(skip_all, fields(results = results.len()))]
pub fn merge(results: &[TranscriptionResult], overlap_seconds: f64) -> MergedTranscript {
    let mut lifted: Vec<ChunkWords> = results.iter().filter_map(lift).collect();

    if lifted.is_empty() {
        debug!("No word timings available, falling back to text merge");
        return merge_text_only(results);
    }

    let mut diagnostics = MergeDiagnostics::default();

    if overlap_seconds > 0.0 {
        for i in 1..lifted.len() {
            let (earlier, later) = lifted.split_at_mut(i);
            resolve_pair(&mut earlier[i - 1], &mut later[0], &mut diagnostics);
        }
    }

    let mut words: Vec<AnchoredWord> = Vec::new();
    for chunk in &lifted {
        words.extend_from_slice(chunk.retained());
    }
    diagnostics.words_emitted = words.len();

    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    debug!(
        "Merged {} words, {} dropped across {} overlaps",
        diagnostics.words_emitted, diagnostics.words_dropped, diagnostics.overlaps_merged
    );
    MergedTranscript {
        text,
        words,
        diagnostics,
    }
}

fn lift(result: &TranscriptionResult) -> Option<ChunkWords> {
    let TranscriptionResult::Success { chunk, words, .. } = result else {
        return None;
    };
    if words.is_empty() {
        return None;
    }
    let anchored: Vec<AnchoredWord> = words.iter().map(|w| anchor(w, chunk)).collect();
    Some(ChunkWords {
        keep_from: 0,
        keep_to: anchored.len(),
        words: anchored,
    })
}

/// Converts a chunk-relative word to absolute time and scores its
/// centrality: distance to the nearest logical boundary, normalized to the
/// chunk half-length. Words lying in the overlap outside the logical span
/// score negative.
fn anchor(word: &Word, chunk: &Chunk) -> AnchoredWord {
    let start = chunk.actual_start + word.start;
    let end = chunk.actual_start + word.end;
    let half_len = chunk.logical_len() / 2.0;
    let centrality = (start - chunk.logical_start).min(chunk.logical_end - end) / half_len;
    AnchoredWord {
        text: word.text.clone(),
        start,
        end,
        centrality,
    }
}

/// Resolves the duplicated region between two adjacent chunks.
///
/// The overlap spans from the later chunk's first word to the earlier
/// chunk's last word. Whichever side has the strictly higher mean
/// centrality keeps its words; ties go to the later chunk.
fn resolve_pair(earlier: &mut ChunkWords, later: &mut ChunkWords, diagnostics: &mut MergeDiagnostics) {
    let (Some(earlier_last), Some(later_first)) =
        (earlier.retained().last(), later.retained().first())
    else {
        return;
    };
    let ov_start = later_first.start;
    let ov_end = earlier_last.end;
    if ov_end <= ov_start {
        return;
    }
    diagnostics.overlaps_merged += 1;

    let earlier_words = earlier.retained();
    let tail_from = earlier_words
        .iter()
        .position(|w| w.start >= ov_start - OVERLAP_SLICE_TOLERANCE)
        .unwrap_or(earlier_words.len());
    let tail = &earlier_words[tail_from..];

    let later_words = later.retained();
    let head_len = later_words
        .iter()
        .take_while(|w| w.start <= ov_end + OVERLAP_SLICE_TOLERANCE)
        .count();
    let head = &later_words[..head_len];

    if mean_centrality(tail) > mean_centrality(head) {
        diagnostics.words_dropped += head.len();
        later.keep_from += head_len;
    } else {
        diagnostics.words_dropped += tail.len();
        earlier.keep_to -= tail.len();
    }
}

fn mean_centrality(words: &[AnchoredWord]) -> f64 {
    if words.is_empty() {
        return f64::NEG_INFINITY;
    }
    words.iter().map(|w| w.centrality).sum::<f64>() / words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CutKind;
    use crate::transcription::classify::ErrorKind;

    fn chunk(index: usize, logical_start: f64, logical_end: f64, overlap: f64) -> Chunk {
        Chunk {
            index,
            logical_start,
            logical_end,
            actual_start: (logical_start - overlap).max(0.0),
            actual_end: logical_end + overlap,
            cut_kind: CutKind::Exact,
        }
    }

    /// Words given in absolute time for readability; converted to
    /// chunk-relative the way the service reports them.
    fn success(chunk: Chunk, words_abs: &[(&str, f64, f64)]) -> TranscriptionResult {
        let words = words_abs
            .iter()
            .map(|(text, start, end)| Word {
                text: text.to_string(),
                start: start - chunk.actual_start,
                end: end - chunk.actual_start,
            })
            .collect();
        TranscriptionResult::Success {
            chunk,
            text: words_abs
                .iter()
                .map(|(t, _, _)| *t)
                .collect::<Vec<_>>()
                .join(" "),
            words,
            detected_language: Some("en".to_string()),
            reported_duration: 0.0,
        }
    }

    fn texts(merged: &MergedTranscript) -> Vec<&str> {
        merged.words.iter().map(|w| w.text.as_str()).collect()
    }

    #[test]
    fn test_single_result_is_stable() {
        let result = success(
            chunk(0, 0.0, 120.0, 0.0),
            &[("god", 0.4, 0.7), ("morgen", 0.8, 1.2), ("alle", 1.3, 1.6)],
        );

        let merged = merge(&[result], 10.0);

        assert_eq!(texts(&merged), vec!["god", "morgen", "alle"]);
        assert_eq!(merged.text, "god morgen alle");
        assert!((merged.words[0].start - 0.4).abs() < 1e-9);
        assert!((merged.words[2].end - 1.6).abs() < 1e-9);
        assert_eq!(merged.diagnostics.words_dropped, 0);
        assert_eq!(merged.diagnostics.overlaps_merged, 0);
        assert_eq!(merged.diagnostics.words_emitted, 3);
    }

    #[test]
    fn test_later_chunk_wins_overlap_it_is_more_central_to() {
        // The duplicated words sit past A's logical end but just inside B's
        // logical span, so B heard them with more context on both sides.
        let a = success(
            chunk(0, 0.0, 10.0, 2.0),
            &[
                ("one", 1.0, 1.4),
                ("two", 5.0, 5.4),
                ("three", 10.3, 10.6),
                ("four", 10.7, 11.0),
            ],
        );
        let b = success(
            chunk(1, 10.0, 20.0, 2.0),
            &[
                ("three", 10.3, 10.6),
                ("four", 10.7, 11.0),
                ("five", 14.0, 14.4),
                ("six", 18.0, 18.4),
            ],
        );

        let merged = merge(&[a, b], 2.0);

        assert_eq!(
            texts(&merged),
            vec!["one", "two", "three", "four", "five", "six"]
        );
        assert_eq!(merged.diagnostics.overlaps_merged, 1);
        assert_eq!(merged.diagnostics.words_dropped, 2);
        assert_eq!(merged.diagnostics.words_emitted, 6);
    }

    #[test]
    fn test_earlier_chunk_wins_when_more_central() {
        // Duplicated words lie before B's logical start, deep inside A.
        let a = success(
            chunk(0, 0.0, 10.0, 2.0),
            &[("one", 1.0, 1.4), ("two", 8.6, 9.0), ("three", 9.2, 9.6)],
        );
        let b = success(
            chunk(1, 10.0, 20.0, 2.0),
            &[("two", 8.6, 9.0), ("three", 9.2, 9.6), ("four", 14.0, 14.4)],
        );

        let merged = merge(&[a, b], 2.0);

        assert_eq!(texts(&merged), vec!["one", "two", "three", "four"]);
        assert_eq!(merged.diagnostics.words_dropped, 2);
    }

    #[test]
    fn test_tie_prefers_later_chunk() {
        // Symmetric logical spans and symmetric word placement around the
        // boundary give both sets the same mean centrality.
        let a = success(
            chunk(0, 0.0, 10.0, 2.0),
            &[("early", 4.0, 4.4), ("mid", 9.7, 10.3)],
        );
        let b = success(
            chunk(1, 10.0, 20.0, 2.0),
            &[("mid", 9.7, 10.3), ("late", 15.6, 16.0)],
        );

        let merged = merge(&[a, b], 2.0);

        // A's "mid" was dropped; B's copy survives.
        assert_eq!(texts(&merged), vec!["early", "mid", "late"]);
        assert_eq!(merged.diagnostics.words_dropped, 1);
    }

    #[test]
    fn test_no_overlap_keeps_everything() {
        let a = success(
            chunk(0, 0.0, 10.0, 2.0),
            &[("one", 1.0, 1.4), ("two", 8.0, 8.4)],
        );
        let b = success(
            chunk(1, 10.0, 20.0, 2.0),
            &[("three", 11.0, 11.4), ("four", 18.0, 18.4)],
        );

        let merged = merge(&[a, b], 2.0);

        assert_eq!(texts(&merged), vec!["one", "two", "three", "four"]);
        assert_eq!(merged.diagnostics.overlaps_merged, 0);
        assert_eq!(merged.diagnostics.words_dropped, 0);
    }

    #[test]
    fn test_word_accounting_balances() {
        let a = success(
            chunk(0, 0.0, 10.0, 2.0),
            &[("one", 1.0, 1.4), ("two", 10.2, 10.6)],
        );
        let b = success(
            chunk(1, 10.0, 20.0, 2.0),
            &[("two", 10.2, 10.6), ("three", 12.0, 12.4)],
        );
        let c = success(
            chunk(2, 20.0, 30.0, 2.0),
            &[("four", 21.0, 21.4), ("five", 28.0, 28.4)],
        );

        let total_in: usize = 6;
        let merged = merge(&[a, b, c], 2.0);

        assert_eq!(
            merged.diagnostics.words_emitted,
            total_in - merged.diagnostics.words_dropped
        );
        assert_eq!(merged.diagnostics.overlaps_merged, 1);
    }

    #[test]
    fn test_failed_chunks_are_skipped() {
        let a = success(chunk(0, 0.0, 10.0, 2.0), &[("one", 1.0, 1.4)]);
        let failure = TranscriptionResult::Failure {
            chunk: chunk(1, 10.0, 20.0, 2.0),
            kind: ErrorKind::ServerError,
            message: "unavailable".to_string(),
        };
        let c = success(chunk(2, 20.0, 30.0, 2.0), &[("two", 21.0, 21.4)]);

        let merged = merge(&[a, failure, c], 2.0);

        assert_eq!(texts(&merged), vec!["one", "two"]);
        assert_eq!(merged.diagnostics.overlaps_merged, 0);
    }

    #[test]
    fn test_results_without_words_use_text_fallback() {
        let mut a = success(chunk(0, 0.0, 10.0, 2.0), &[]);
        if let TranscriptionResult::Success { text, .. } = &mut a {
            *text = "okay so today we will talk about memory safety".to_string();
        }
        let mut b = success(chunk(1, 10.0, 20.0, 2.0), &[]);
        if let TranscriptionResult::Success { text, .. } = &mut b {
            *text = "about memory safety and why it matters so much".to_string();
        }

        let merged = merge(&[a, b], 2.0);

        assert!(merged.words.is_empty());
        assert_eq!(
            merged.text,
            "okay so today we will talk about memory safety and why it matters so much"
        );
    }

    #[test]
    fn test_zero_overlap_skips_resolution() {
        // Identical word times, but the plan had no overlap configured.
        let a = success(chunk(0, 0.0, 10.0, 0.0), &[("one", 9.0, 10.1)]);
        let b = success(chunk(1, 10.0, 20.0, 0.0), &[("one", 9.9, 10.4)]);

        let merged = merge(&[a, b], 0.0);

        assert_eq!(merged.diagnostics.overlaps_merged, 0);
        assert_eq!(merged.words.len(), 2);
    }

    #[test]
    fn test_out_of_order_words_are_not_resorted() {
        let result = success(
            chunk(0, 0.0, 30.0, 0.0),
            &[("b", 2.0, 2.4), ("a", 1.8, 2.0), ("c", 2.5, 2.9)],
        );

        let merged = merge(&[result], 10.0);

        assert_eq!(texts(&merged), vec!["b", "a", "c"]);
    }
}
