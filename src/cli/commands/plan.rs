//! The `plan` command: show the chunk plan without transcribing.

use crate::audio::probe::{AudioProbe, FfmpegProbe};
use crate::cli::output::format_duration;
use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::error::{Result, SkiveError};
use crate::planner::{plan_with_progress, CutKind, PlannerConfig};
use std::path::Path;

pub async fn run_plan(file: &str, settings: Settings) -> Result<()> {
    let path = Path::new(file);
    if !path.exists() {
        return Err(SkiveError::InvalidInput(format!("File not found: {}", file)));
    }

    preflight::check(preflight::Operation::Plan, &settings)?;

    let probe = FfmpegProbe;
    let duration = probe.duration(path).await?;
    Output::info(&format!(
        "{} ({})",
        file,
        format_duration(duration)
    ));

    let spinner = Output::spinner("planning chunks...");
    let config = PlannerConfig::from(&settings.planner);
    let chunks = plan_with_progress(&probe, path, &config, &mut |pct| {
        spinner.set_message(format!("planning chunks... {:.0}%", pct));
    })
    .await?;
    spinner.finish_and_clear();

    Output::header(&format!("Plan: {} chunks", chunks.len()));
    for chunk in &chunks {
        let kind = match chunk.cut_kind {
            CutKind::Silence => "silence",
            CutKind::Exact => "exact",
            CutKind::End => "end",
        };
        Output::list_item(&format!(
            "chunk {:>3}  logical {:>9.2}s - {:>9.2}s  extract {:>9.2}s - {:>9.2}s  (+{:.1}s/+{:.1}s, cut: {})",
            chunk.index,
            chunk.logical_start,
            chunk.logical_end,
            chunk.actual_start,
            chunk.actual_end,
            chunk.leading_overlap(),
            chunk.trailing_overlap(),
            kind
        ));
    }

    let silence_cuts = chunks
        .iter()
        .filter(|c| c.cut_kind == CutKind::Silence)
        .count();
    Output::kv("cuts on silence", &format!("{} of {}", silence_cuts, chunks.len().saturating_sub(1)));

    Ok(())
}
