//! Silence-guided chunk planning.
//!
//! Two passes over the timeline. Pass 1 walks forward in steps of the target
//! chunk length and, for each ideal boundary, asks the probe for quiet
//! regions nearby; the cut lands on the best silence's midpoint, or exactly
//! on the ideal position when nothing quiet is found. Pass 2 materializes
//! chunks whose extraction ranges extend into their neighbors by the
//! configured overlap, so boundary words are heard twice.

use crate::audio::probe::{AudioProbe, Silence};
use crate::config::PlannerSettings;
use crate::error::{Result, SkiveError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Score penalty per second between a silence midpoint and the ideal cut,
/// in the same units as silence length (milliseconds).
const DISTANCE_PENALTY_PER_SEC: f64 = 100.0;

/// Remainders shorter than this are absorbed into the final chunk.
const MIN_TAIL_SECS: f64 = 1.0;

/// How a chunk's closing boundary was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutKind {
    /// Midpoint of a detected quiet region.
    Silence,
    /// Exact ideal position; no usable silence nearby.
    Exact,
    /// End of the recording.
    End,
}

/// An immutable plan record for one chunk.
///
/// Logical boundaries tile the recording without gaps; actual boundaries are
/// the extraction range sent to the service and extend into the neighbors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub logical_start: f64,
    pub logical_end: f64,
    pub actual_start: f64,
    pub actual_end: f64,
    pub cut_kind: CutKind,
}

impl Chunk {
    /// Seconds of extra audio ahead of the logical start.
    pub fn leading_overlap(&self) -> f64 {
        self.logical_start - self.actual_start
    }

    /// Seconds of extra audio past the logical end.
    pub fn trailing_overlap(&self) -> f64 {
        self.actual_end - self.logical_end
    }

    pub fn logical_len(&self) -> f64 {
        self.logical_end - self.logical_start
    }

    pub fn actual_len(&self) -> f64 {
        self.actual_end - self.actual_start
    }
}

/// Planner tunables.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub chunk_length_seconds: f64,
    pub overlap_seconds: f64,
    pub silence_window_seconds: f64,
    pub rms_threshold: f32,
    pub min_silence_duration_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::from(&PlannerSettings::default())
    }
}

impl From<&PlannerSettings> for PlannerConfig {
    fn from(settings: &PlannerSettings) -> Self {
        Self {
            chunk_length_seconds: settings.chunk_length_seconds,
            overlap_seconds: settings.overlap_seconds,
            silence_window_seconds: settings.silence_window_seconds,
            rms_threshold: settings.rms_threshold,
            min_silence_duration_ms: settings.min_silence_duration_ms,
        }
    }
}

impl PlannerConfig {
    /// Rejects configurations the planner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.chunk_length_seconds > 0.0) {
            return Err(SkiveError::Config(
                "chunk_length_seconds must be positive".into(),
            ));
        }
        if !(self.silence_window_seconds > 0.0) {
            return Err(SkiveError::Config(
                "silence_window_seconds must be positive".into(),
            ));
        }
        if self.overlap_seconds < 0.0 {
            return Err(SkiveError::Config("overlap_seconds must not be negative".into()));
        }
        if self.rms_threshold < 0.0 {
            return Err(SkiveError::Config("rms_threshold must not be negative".into()));
        }
        Ok(())
    }
}

/// Plan chunks for a file without progress reporting.
pub async fn plan(
    probe: &dyn AudioProbe,
    file: &Path,
    config: &PlannerConfig,
) -> Result<Vec<Chunk>> {
    plan_with_progress(probe, file, config, &mut |_| {}).await
}

/// Plan chunks for a file, reporting monotonic progress in [0, 100].
///
/// Pass 1 (cut points) covers the first half of the progress range, pass 2
/// (materialization) the second half.
#[instrument(skip_all, fields(file = %file.display()))]
pub async fn plan_with_progress(
    probe: &dyn AudioProbe,
    file: &Path,
    config: &PlannerConfig,
    progress: &mut dyn FnMut(f64),
) -> Result<Vec<Chunk>> {
    config.validate()?;

    let duration = probe.duration(file).await?;
    if duration <= 0.0 {
        return Err(SkiveError::Planner("audio reports zero duration".into()));
    }

    let mut reporter = MonotonicProgress::new(progress);
    let estimated_cuts = (duration / config.chunk_length_seconds).ceil().max(1.0);

    // Pass 1: locate cut points.
    let mut interior: Vec<(f64, CutKind)> = Vec::new();
    let mut last = 0.0;
    loop {
        let ideal = (last + config.chunk_length_seconds).min(duration);
        if ideal >= duration - MIN_TAIL_SECS {
            break;
        }

        // A probe failure degrades to an exact cut; it never aborts the plan.
        let silences = match probe
            .silences_in_window(
                file,
                ideal,
                config.silence_window_seconds,
                config.rms_threshold,
                config.min_silence_duration_ms,
            )
            .await
        {
            Ok(silences) => silences,
            Err(e) => {
                warn!("Silence probe failed near {:.1}s, cutting exactly: {}", ideal, e);
                Vec::new()
            }
        };

        let cut = match best_silence(&silences, ideal, last, duration) {
            Some(silence) => {
                debug!(
                    "Cut at {:.2}s inside a {}ms silence (ideal {:.2}s)",
                    silence.midpoint(),
                    silence.duration_ms,
                    ideal
                );
                (silence.midpoint(), CutKind::Silence)
            }
            None => {
                debug!("No usable silence near {:.2}s, cutting exactly", ideal);
                (ideal, CutKind::Exact)
            }
        };

        interior.push(cut);
        last = cut.0;
        reporter.report((interior.len() as f64 / estimated_cuts).min(1.0) * 50.0);
    }

    // Pass 2: materialize chunks with overlap.
    let total = interior.len() + 1;
    let mut chunks = Vec::with_capacity(total);
    let mut start = 0.0;
    for (i, &(cut, kind)) in interior.iter().enumerate() {
        chunks.push(materialize(i, start, cut, kind, config.overlap_seconds, duration, total));
        start = cut;
        reporter.report(50.0 + ((i + 1) as f64 / total as f64) * 50.0);
    }
    chunks.push(materialize(
        total - 1,
        start,
        duration,
        CutKind::End,
        config.overlap_seconds,
        duration,
        total,
    ));
    reporter.report(100.0);

    debug!("Planned {} chunks over {:.1}s", chunks.len(), duration);
    Ok(chunks)
}

fn materialize(
    index: usize,
    logical_start: f64,
    logical_end: f64,
    cut_kind: CutKind,
    overlap: f64,
    duration: f64,
    total: usize,
) -> Chunk {
    let actual_start = if index == 0 {
        0.0
    } else {
        (logical_start - overlap).max(0.0)
    };
    let actual_end = if index == total - 1 {
        duration
    } else {
        (logical_end + overlap).min(duration)
    };
    Chunk {
        index,
        logical_start,
        logical_end,
        actual_start,
        actual_end,
        cut_kind,
    }
}

/// Picks the silence maximizing `duration_ms - |midpoint - ideal| * 100`.
///
/// Strictly-greater comparison, so the earlier candidate wins ties. A cut
/// must advance the timeline, so midpoints at or before the previous cut
/// are skipped.
fn best_silence<'a>(
    silences: &'a [Silence],
    ideal: f64,
    after: f64,
    duration: f64,
) -> Option<&'a Silence> {
    let mut best: Option<(&Silence, f64)> = None;
    for silence in silences {
        let midpoint = silence.midpoint();
        if midpoint <= after || midpoint >= duration {
            continue;
        }
        let score = silence.duration_ms as f64 - (midpoint - ideal).abs() * DISTANCE_PENALTY_PER_SEC;
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((silence, score)),
        }
    }
    best.map(|(silence, _)| silence)
}

struct MonotonicProgress<'a> {
    sink: &'a mut dyn FnMut(f64),
    last: f64,
}

impl<'a> MonotonicProgress<'a> {
    fn new(sink: &'a mut dyn FnMut(f64)) -> Self {
        Self { sink, last: 0.0 }
    }

    fn report(&mut self, pct: f64) {
        let pct = pct.clamp(0.0, 100.0);
        if pct > self.last {
            self.last = pct;
            (self.sink)(pct);
        }
    }
}
