//! The `transcribe` command: full pipeline with progress reporting.

use crate::cli::output::format_duration;
use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::error::{Result, SkiveError};
use crate::planner::Chunk;
use crate::session::{Session, SessionOutcome};
use crate::transcription::classify::ErrorKind;
use crate::transcription::dispatch::{ChunkLifecycle, PlanOutcome};
use crate::transcription::format::{format_transcript, OutputFormat};
use crate::transcription::models::TranscriptionResult;
use indicatif::ProgressBar;
use std::path::Path;
use std::str::FromStr;

/// Lifecycle hooks that drive the chunk progress bar.
struct ProgressHooks {
    bar: ProgressBar,
}

impl ChunkLifecycle for ProgressHooks {
    fn on_chunk_start(&self, chunk: &Chunk, index: usize) {
        self.bar.set_message(format!(
            "chunk {} [{} - {}]",
            index,
            format_duration(chunk.logical_start),
            format_duration(chunk.logical_end)
        ));
    }

    fn on_chunk_complete(&self, _chunk: &Chunk, _index: usize, _result: &TranscriptionResult) {
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, _chunk: &Chunk, index: usize, kind: ErrorKind, _message: &str) {
        self.bar.inc(1);
        self.bar
            .println(format!("  chunk {} failed: {}", index, kind));
    }

    fn on_retry(
        &self,
        _chunk: &Chunk,
        index: usize,
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
        kind: ErrorKind,
    ) {
        self.bar.set_message(format!(
            "chunk {}: {} error, retry {}/{} in {}ms",
            index, kind, attempt, max_attempts, delay_ms
        ));
    }
}

pub async fn run_transcribe(
    file: &str,
    output: Option<String>,
    format: &str,
    language: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    let format = OutputFormat::from_str(format).map_err(SkiveError::InvalidInput)?;
    let path = Path::new(file);
    if !path.exists() {
        return Err(SkiveError::InvalidInput(format!("File not found: {}", file)));
    }

    preflight::check(preflight::Operation::Transcribe, &settings)?;

    if language.is_some() {
        settings.service.language = language;
    }
    let session = Session::new(settings)?;

    // Ctrl-C cancels cooperatively; partial results still come back.
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            Output::warning("Cancelling after the current safe point...");
            cancel.cancel();
        }
    });

    Output::info(&format!("Transcribing {}", file));

    let plan_bar = Output::spinner("planning chunks...");
    let chunks = session
        .plan_only(path, &mut |pct| {
            plan_bar.set_message(format!("planning chunks... {:.0}%", pct));
        })
        .await?;
    plan_bar.finish_and_clear();
    Output::info(&format!("{} chunks planned", chunks.len()));

    let chunk_bar = Output::progress_bar(chunks.len() as u64, "transcribing");
    let hooks = ProgressHooks {
        bar: chunk_bar.clone(),
    };
    let outcome = session.transcribe_planned(path, chunks, &hooks).await?;
    chunk_bar.finish_and_clear();

    report_summary(&outcome);

    // Cancelled before anything came back: nothing to write.
    if outcome.report.outcome == PlanOutcome::Cancelled && outcome.report.results.is_empty() {
        return Err(SkiveError::Cancelled);
    }

    let rendered = format_transcript(&outcome.transcript, format);
    match output {
        Some(dest) => {
            std::fs::write(&dest, rendered)?;
            Output::success(&format!("Transcript written to {}", dest));
        }
        None => {
            println!("{}", rendered);
        }
    }

    Ok(())
}

fn report_summary(outcome: &SessionOutcome) {
    let report = &outcome.report;
    match report.outcome {
        PlanOutcome::Completed => {
            Output::success(&format!(
                "All {} chunks transcribed ({} words)",
                report.results.len(),
                outcome.transcript.diagnostics.words_emitted
            ));
        }
        PlanOutcome::PartiallyCompleted => {
            Output::warning(&format!(
                "{} of {} chunks transcribed; the transcript is best-effort",
                report.succeeded(),
                outcome.chunks.len()
            ));
            for result in &report.results {
                if let TranscriptionResult::Failure { chunk, kind, message } = result {
                    Output::list_item(&format!("chunk {}: {} ({})", chunk.index, kind, message));
                }
            }
        }
        PlanOutcome::Cancelled => {
            Output::warning(&format!(
                "Cancelled after {} of {} chunks; partial transcript follows",
                report.results.len(),
                outcome.chunks.len()
            ));
        }
    }

    let diagnostics = &outcome.transcript.diagnostics;
    if diagnostics.overlaps_merged > 0 {
        Output::kv(
            "overlaps merged",
            &format!(
                "{} ({} duplicated words removed)",
                diagnostics.overlaps_merged, diagnostics.words_dropped
            ),
        );
    }
}
