//! Audio probing: duration, silence regions, waveform summaries.
//!
//! Silence detection computes RMS over fixed 50 ms analysis frames; a
//! contiguous run of frames below the threshold long enough to satisfy the
//! minimum duration becomes a [`Silence`]. The scan itself is a pure
//! function over decoded samples so it stays testable without a decoder.

use crate::audio::ffmpeg::{decode_pcm_window, probe_duration, ANALYSIS_SAMPLE_RATE};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Length of one RMS analysis frame in milliseconds.
const FRAME_MS: u64 = 50;

/// Files longer than this use the sampled waveform strategy.
const WAVEFORM_SAMPLED_THRESHOLD_SECS: f64 = 600.0;

/// Snippet length decoded per waveform point in sampled mode.
const WAVEFORM_SNIPPET_SECS: f64 = 0.25;

/// A detected quiet region, in absolute recording time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Silence {
    /// Start of the quiet run in seconds.
    pub start: f64,
    /// End of the quiet run in seconds.
    pub end: f64,
    /// Total quiet span in milliseconds.
    pub duration_ms: u64,
}

impl Silence {
    /// Center of the quiet run.
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// Read-only view of an audio file's shape.
///
/// All operations are pure with respect to the file bytes and idempotent.
#[async_trait]
pub trait AudioProbe: Send + Sync {
    /// Total playable duration in seconds.
    async fn duration(&self, file: &Path) -> Result<f64>;

    /// Quiet regions inside the window centered on `center`.
    ///
    /// Only the window is decoded. Returned times are absolute.
    async fn silences_in_window(
        &self,
        file: &Path,
        center: f64,
        window_seconds: f64,
        rms_threshold: f32,
        min_silence_ms: u64,
    ) -> Result<Vec<Silence>>;

    /// Peak-amplitude summary of the whole file, `num_points` values in [0, 1].
    async fn waveform(&self, file: &Path, num_points: usize) -> Result<Vec<f32>>;
}

/// Probe backed by ffmpeg/ffprobe child processes.
pub struct FfmpegProbe;

#[async_trait]
impl AudioProbe for FfmpegProbe {
    async fn duration(&self, file: &Path) -> Result<f64> {
        probe_duration(file).await
    }

    #[instrument(skip(self, file), fields(file = %file.display()))]
    async fn silences_in_window(
        &self,
        file: &Path,
        center: f64,
        window_seconds: f64,
        rms_threshold: f32,
        min_silence_ms: u64,
    ) -> Result<Vec<Silence>> {
        let duration = probe_duration(file).await?;
        let win_start = (center - window_seconds / 2.0).max(0.0);
        let win_end = (center + window_seconds / 2.0).min(duration);
        if win_end <= win_start {
            return Ok(Vec::new());
        }

        let samples = decode_pcm_window(file, win_start, win_end - win_start).await?;
        let silences = detect_silences(
            &samples,
            ANALYSIS_SAMPLE_RATE,
            win_start,
            rms_threshold,
            min_silence_ms,
        );
        debug!("Found {} silences around {:.1}s", silences.len(), center);
        Ok(silences)
    }

    async fn waveform(&self, file: &Path, num_points: usize) -> Result<Vec<f32>> {
        if num_points == 0 {
            return Ok(Vec::new());
        }
        let duration = probe_duration(file).await?;

        if duration <= WAVEFORM_SAMPLED_THRESHOLD_SECS {
            let samples = decode_pcm_window(file, 0.0, duration).await?;
            return Ok(peak_buckets(&samples, num_points));
        }

        // Long file: decode a short snippet at each point instead of the
        // whole stream, so memory stays bounded by the snippet.
        let step = duration / num_points as f64;
        let mut points = Vec::with_capacity(num_points);
        for i in 0..num_points {
            let at = (i as f64 * step).min(duration - WAVEFORM_SNIPPET_SECS).max(0.0);
            let snippet = decode_pcm_window(file, at, WAVEFORM_SNIPPET_SECS).await?;
            points.push(peak(&snippet));
        }
        Ok(points)
    }
}

/// Calculates the normalized Root Mean Square of audio samples.
///
/// 0.0 is silence; a full-scale sine wave is ~0.707.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Scans fixed-length frames for quiet runs at least `min_silence_ms` long.
///
/// `window_start` offsets the returned times into absolute recording time.
pub fn detect_silences(
    samples: &[i16],
    sample_rate: u32,
    window_start: f64,
    rms_threshold: f32,
    min_silence_ms: u64,
) -> Vec<Silence> {
    let frame_len = (sample_rate as u64 * FRAME_MS / 1000) as usize;
    if frame_len == 0 || samples.is_empty() {
        return Vec::new();
    }

    let mut silences = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut frame_count = 0;

    for (i, frame) in samples.chunks(frame_len).enumerate() {
        frame_count = i + 1;
        let quiet = rms(frame) < rms_threshold;
        match (quiet, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(from)) => {
                push_run(&mut silences, from, i, window_start, min_silence_ms);
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(from) = run_start {
        push_run(&mut silences, from, frame_count, window_start, min_silence_ms);
    }

    silences
}

fn push_run(
    silences: &mut Vec<Silence>,
    from_frame: usize,
    to_frame: usize,
    window_start: f64,
    min_silence_ms: u64,
) {
    let span_ms = (to_frame - from_frame) as u64 * FRAME_MS;
    if span_ms < min_silence_ms {
        return;
    }
    silences.push(Silence {
        start: window_start + from_frame as f64 * FRAME_MS as f64 / 1000.0,
        end: window_start + to_frame as f64 * FRAME_MS as f64 / 1000.0,
        duration_ms: span_ms,
    });
}

/// Buckets samples into `num_points` peak amplitudes in [0, 1].
///
/// Always returns exactly `num_points` values; missing trailing buckets
/// read as 0.
pub fn peak_buckets(samples: &[i16], num_points: usize) -> Vec<f32> {
    if num_points == 0 {
        return Vec::new();
    }
    if samples.is_empty() {
        return vec![0.0; num_points];
    }

    let bucket_len = samples.len().div_ceil(num_points).max(1);
    let mut points: Vec<f32> = samples.chunks(bucket_len).map(peak).collect();
    points.resize(num_points, 0.0);
    points
}

fn peak(samples: &[i16]) -> f32 {
    samples
        .iter()
        .map(|&s| (s as i32).abs())
        .max()
        .unwrap_or(0) as f32
        / -(i16::MIN as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud(count: usize) -> Vec<i16> {
        vec![3000; count]
    }

    fn quiet(count: usize) -> Vec<i16> {
        vec![0; count]
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(rms(&quiet(1000)), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = rms(&vec![i16::MAX; 1000]);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_rms_empty_samples() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_detects_silence_above_minimum_duration() {
        // 1 kHz sample rate keeps frame math simple: 50 samples per frame.
        let mut samples = loud(500);
        samples.extend(quiet(500));
        samples.extend(loud(1000));

        let silences = detect_silences(&samples, 1000, 10.0, 0.01, 300);

        assert_eq!(silences.len(), 1);
        let s = &silences[0];
        assert!((s.start - 10.5).abs() < 1e-9);
        assert!((s.end - 11.0).abs() < 1e-9);
        assert_eq!(s.duration_ms, 500);
        assert!((s.midpoint() - 10.75).abs() < 1e-9);
    }

    #[test]
    fn test_short_quiet_run_is_ignored() {
        let mut samples = loud(500);
        samples.extend(quiet(200)); // 200 ms, below the 300 ms minimum
        samples.extend(loud(500));

        let silences = detect_silences(&samples, 1000, 0.0, 0.01, 300);
        assert!(silences.is_empty());
    }

    #[test]
    fn test_trailing_silence_is_flushed() {
        let mut samples = loud(500);
        samples.extend(quiet(400));

        let silences = detect_silences(&samples, 1000, 0.0, 0.01, 300);

        assert_eq!(silences.len(), 1);
        assert_eq!(silences[0].duration_ms, 400);
        assert!((silences[0].end - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_silences_in_one_window() {
        let mut samples = loud(200);
        samples.extend(quiet(300));
        samples.extend(loud(200));
        samples.extend(quiet(350));
        samples.extend(loud(200));

        let silences = detect_silences(&samples, 1000, 0.0, 0.01, 300);
        assert_eq!(silences.len(), 2);
        assert_eq!(silences[0].duration_ms, 300);
        assert_eq!(silences[1].duration_ms, 350);
    }

    #[test]
    fn test_threshold_is_strict() {
        // Frames exactly at the threshold are not silent.
        let samples = quiet(1000);
        let silences = detect_silences(&samples, 1000, 0.0, 0.0, 300);
        assert!(silences.is_empty());
    }

    #[test]
    fn test_peak_buckets_length_and_values() {
        let mut samples = vec![0i16; 100];
        samples[10] = 16384; // bucket 0 with 4 points over 100 samples
        samples[80] = -32768;

        let points = peak_buckets(&samples, 4);

        assert_eq!(points.len(), 4);
        assert!((points[0] - 0.5).abs() < 0.01);
        assert!((points[3] - 1.0).abs() < 0.001);
        assert_eq!(points[1], 0.0);
    }

    #[test]
    fn test_peak_buckets_fewer_samples_than_points() {
        let points = peak_buckets(&[1000, 2000], 5);
        assert_eq!(points.len(), 5);
        assert!(points[2] == 0.0 && points[3] == 0.0 && points[4] == 0.0);
    }

    #[test]
    fn test_peak_buckets_empty() {
        assert_eq!(peak_buckets(&[], 3), vec![0.0, 0.0, 0.0]);
        assert!(peak_buckets(&[1], 0).is_empty());
    }
}
