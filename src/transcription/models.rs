//! Data models for transcription.

use crate::config::RetrySettings;
use crate::planner::Chunk;
use crate::transcription::classify::ErrorKind;
use serde::{Deserialize, Serialize};

/// A single word with timing as returned by the service, chunk-relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    /// Raw surface form; opaque bytes until output.
    #[serde(rename = "word")]
    pub text: String,
    /// Start time in seconds from the chunk's payload start.
    pub start: f64,
    /// End time in seconds from the chunk's payload start.
    pub end: f64,
}

/// Parsed verbose JSON response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceTranscript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub words: Vec<Word>,
}

/// Outcome of one chunk's round trip.
#[derive(Debug, Clone)]
pub enum TranscriptionResult {
    Success {
        chunk: Chunk,
        text: String,
        words: Vec<Word>,
        detected_language: Option<String>,
        reported_duration: f64,
    },
    Failure {
        chunk: Chunk,
        kind: ErrorKind,
        message: String,
    },
}

impl TranscriptionResult {
    pub fn chunk(&self) -> &Chunk {
        match self {
            TranscriptionResult::Success { chunk, .. } => chunk,
            TranscriptionResult::Failure { chunk, .. } => chunk,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TranscriptionResult::Success { .. })
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay_ms: settings.initial_delay_ms,
            multiplier: settings.multiplier,
            max_delay_ms: settings.max_delay_ms,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-based), capped at the ceiling.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let raw = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        raw.min(self.max_delay_ms as f64) as u64
    }
}
