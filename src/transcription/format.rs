//! Transcript output formatting (JSON, SRT, VTT, plain text).
//!
//! Subtitle formats need cues rather than single words, so words are
//! grouped at pause boundaries with a per-cue word cap.

use crate::merge::{AnchoredWord, MergeDiagnostics, MergedTranscript};
use serde::Serialize;

/// Maximum words per subtitle cue.
const MAX_CUE_WORDS: usize = 12;

/// A pause at least this long starts a new cue.
const CUE_GAP_SECS: f64 = 0.8;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Json,
    Srt,
    Vtt,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" | "webvtt" => Ok(OutputFormat::Vtt),
            "txt" | "text" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown format: {}. Use json, srt, vtt, or txt.", s)),
        }
    }
}

/// JSON-serializable transcript for export.
#[derive(Debug, Serialize)]
struct TranscriptExport<'a> {
    text: &'a str,
    words: &'a [AnchoredWord],
    diagnostics: &'a MergeDiagnostics,
}

/// Format a merged transcript for output.
pub fn format_transcript(transcript: &MergedTranscript, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(transcript),
        OutputFormat::Srt => format_srt(transcript),
        OutputFormat::Vtt => format_vtt(transcript),
        OutputFormat::Text => {
            let mut text = transcript.text.clone();
            text.push('\n');
            text
        }
    }
}

fn format_json(transcript: &MergedTranscript) -> String {
    let export = TranscriptExport {
        text: &transcript.text,
        words: &transcript.words,
        diagnostics: &transcript.diagnostics,
    };
    serde_json::to_string_pretty(&export).unwrap_or_else(|_| "{}".to_string())
}

/// Format as SRT (SubRip).
fn format_srt(transcript: &MergedTranscript) -> String {
    let mut output = String::new();

    for (i, cue) in build_cues(&transcript.words).iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(cue.start),
            format_srt_timestamp(cue.end)
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

/// Format as WebVTT.
fn format_vtt(transcript: &MergedTranscript) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for (i, cue) in build_cues(&transcript.words).iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_timestamp(cue.start),
            format_vtt_timestamp(cue.end)
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

struct Cue {
    start: f64,
    end: f64,
    text: String,
}

fn build_cues(words: &[AnchoredWord]) -> Vec<Cue> {
    let mut cues: Vec<Cue> = Vec::new();
    let mut current: Vec<&AnchoredWord> = Vec::new();

    for word in words {
        let needs_new = match current.last() {
            Some(last) => current.len() >= MAX_CUE_WORDS || word.start - last.end > CUE_GAP_SECS,
            None => false,
        };
        if needs_new {
            cues.push(close_cue(&current));
            current.clear();
        }
        current.push(word);
    }
    if !current.is_empty() {
        cues.push(close_cue(&current));
    }

    cues
}

fn close_cue(words: &[&AnchoredWord]) -> Cue {
    Cue {
        start: words.first().map(|w| w.start).unwrap_or(0.0),
        end: words.last().map(|w| w.end).unwrap_or(0.0),
        text: words
            .iter()
            .map(|w| w.text.trim())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Timestamps: 00:00:00,000
fn format_srt_timestamp(seconds: f64) -> String {
    let (hours, minutes, secs, millis) = split_timestamp(seconds);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Timestamps: 00:00:00.000
fn format_vtt_timestamp(seconds: f64) -> String {
    let (hours, minutes, secs, millis) = split_timestamp(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

fn split_timestamp(seconds: f64) -> (u64, u64, u64, u64) {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    (hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> AnchoredWord {
        AnchoredWord {
            text: text.to_string(),
            start,
            end,
            centrality: 0.0,
        }
    }

    fn transcript(words: Vec<AnchoredWord>) -> MergedTranscript {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        MergedTranscript {
            text,
            words,
            diagnostics: MergeDiagnostics::default(),
        }
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(65.25), "00:01:05,250");
        assert_eq!(format_srt_timestamp(3665.007), "01:01:05,007");
        assert_eq!(format_vtt_timestamp(65.25), "00:01:05.250");
    }

    #[test]
    fn test_cues_split_on_long_pause() {
        let t = transcript(vec![
            word("first", 0.0, 0.4),
            word("phrase", 0.5, 0.9),
            word("second", 2.5, 2.9),
            word("phrase", 3.0, 3.4),
        ]);

        let cues = build_cues(&t.words);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first phrase");
        assert_eq!(cues[1].text, "second phrase");
        assert_eq!(cues[1].start, 2.5);
    }

    #[test]
    fn test_cues_cap_word_count() {
        let words: Vec<AnchoredWord> = (0..30)
            .map(|i| word("w", i as f64 * 0.3, i as f64 * 0.3 + 0.2))
            .collect();

        let cues = build_cues(&words);
        assert_eq!(cues.len(), 3);
        assert!(cues.iter().all(|c| c.text.split(' ').count() <= MAX_CUE_WORDS));
    }

    #[test]
    fn test_srt_structure() {
        let t = transcript(vec![word("hello", 0.0, 0.5), word("world", 0.6, 1.0)]);
        let srt = format_transcript(&t, OutputFormat::Srt);

        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,000\nhello world\n"));
    }

    #[test]
    fn test_vtt_has_header() {
        let t = transcript(vec![word("hei", 0.0, 0.5)]);
        let vtt = format_transcript(&t, OutputFormat::Vtt);

        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:00.500"));
    }

    #[test]
    fn test_json_round_trips() {
        let t = transcript(vec![word("hei", 0.1, 0.5)]);
        let json = format_transcript(&t, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["text"], "hei");
        assert_eq!(parsed["words"][0]["start"], 0.1);
        assert_eq!(parsed["diagnostics"]["words_dropped"], 0);
    }

    #[test]
    fn test_format_parsing() {
        use std::str::FromStr;
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("SRT").unwrap(), OutputFormat::Srt);
        assert_eq!(OutputFormat::from_str("webvtt").unwrap(), OutputFormat::Vtt);
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert!(OutputFormat::from_str("pdf").is_err());
    }

    #[test]
    fn test_empty_transcript_formats() {
        let t = transcript(Vec::new());
        assert_eq!(format_transcript(&t, OutputFormat::Srt), "");
        assert_eq!(format_transcript(&t, OutputFormat::Text), "\n");
    }
}
