//! Transcription module for Skive.
//!
//! Handles the remote speech-to-text round trip: the HTTP client, transport
//! error classification, the sequential dispatch loop with retry/backoff,
//! and output formatting for merged transcripts.

pub mod classify;
pub mod dispatch;
pub mod format;
pub mod models;
pub mod service;

pub use classify::{classify, ErrorKind, ServiceError};
pub use dispatch::{
    CancelToken, ChunkLifecycle, DispatchConfig, DispatchReport, Dispatcher, NoopLifecycle,
    PlanOutcome,
};
pub use format::{format_transcript, OutputFormat};
pub use models::{RetryPolicy, ServiceTranscript, TranscriptionResult, Word};
pub use service::{resolve_api_key, validate_api_key, HttpSpeechService, TranscriptionService};
