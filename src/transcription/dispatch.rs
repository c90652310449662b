//! Sequential chunk dispatcher with retry, backoff and cancellation.
//!
//! Chunks are processed strictly in index order; only the remote service's
//! processing overlaps with local work. Suspension points are extraction,
//! the service round trip, and backoff sleeps, and every one of them honors
//! the cancellation token.

use crate::audio::extract::{ChunkExtractor, ChunkPayload};
use crate::planner::Chunk;
use crate::transcription::classify::{classify, ErrorKind, ServiceError};
use crate::transcription::models::{RetryPolicy, ServiceTranscript, TranscriptionResult};
use crate::transcription::service::TranscriptionService;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Cancellation is observed at least this often while sleeping.
const CANCEL_POLL_MS: u64 = 500;

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Lifecycle callbacks invoked at chunk state transitions.
///
/// For one chunk the order is `on_chunk_start`, any number of `on_retry`,
/// then exactly one of `on_chunk_complete` or `on_chunk_error`. Hooks run
/// inline with the dispatch loop and must be cheap.
pub trait ChunkLifecycle: Send + Sync {
    fn on_chunk_start(&self, _chunk: &Chunk, _index: usize) {}
    fn on_chunk_complete(&self, _chunk: &Chunk, _index: usize, _result: &TranscriptionResult) {}
    fn on_chunk_error(&self, _chunk: &Chunk, _index: usize, _kind: ErrorKind, _message: &str) {}
    fn on_retry(
        &self,
        _chunk: &Chunk,
        _index: usize,
        _attempt: u32,
        _max_attempts: u32,
        _delay_ms: u64,
        _kind: ErrorKind,
    ) {
    }
}

/// Hooks that do nothing.
pub struct NoopLifecycle;

impl ChunkLifecycle for NoopLifecycle {}

/// Terminal state of a whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    Completed,
    PartiallyCompleted,
    Cancelled,
}

/// Results of a dispatch run. Partial on cancellation or an auth failure.
#[derive(Debug)]
pub struct DispatchReport {
    /// One entry per processed chunk, in index order.
    pub results: Vec<TranscriptionResult>,
    pub outcome: PlanOutcome,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Dispatcher tunables.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub policy: RetryPolicy,
    /// Hard deadline for a single submission attempt.
    pub per_request_timeout: Duration,
    /// Quiescent pause between chunks.
    pub inter_chunk_delay: Duration,
    pub language: Option<String>,
}

/// Drives every chunk of a plan through extract, submit, classify, retry.
pub struct Dispatcher<'a> {
    service: &'a dyn TranscriptionService,
    extractor: &'a dyn ChunkExtractor,
    hooks: &'a dyn ChunkLifecycle,
    cancel: CancelToken,
    config: DispatchConfig,
}

/// Internal marker: the run was interrupted by the cancellation token.
struct Interrupted;

impl<'a> Dispatcher<'a> {
    pub fn new(
        service: &'a dyn TranscriptionService,
        extractor: &'a dyn ChunkExtractor,
        hooks: &'a dyn ChunkLifecycle,
        cancel: CancelToken,
        config: DispatchConfig,
    ) -> Self {
        Self {
            service,
            extractor,
            hooks,
            cancel,
            config,
        }
    }

    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn transcribe_all(&self, file: &Path, chunks: &[Chunk]) -> DispatchReport {
        let mut results: Vec<TranscriptionResult> = Vec::with_capacity(chunks.len());
        let mut aborted = false;

        for chunk in chunks {
            if self.cancel.is_cancelled() {
                return DispatchReport {
                    results,
                    outcome: PlanOutcome::Cancelled,
                };
            }
            if chunk.index > 0
                && !self.config.inter_chunk_delay.is_zero()
                && self
                    .cancellable_sleep(self.config.inter_chunk_delay)
                    .await
                    .is_err()
            {
                return DispatchReport {
                    results,
                    outcome: PlanOutcome::Cancelled,
                };
            }

            self.hooks.on_chunk_start(chunk, chunk.index);
            match self.run_chunk(file, chunk).await {
                Ok(result) => {
                    match &result {
                        TranscriptionResult::Success { .. } => {
                            self.hooks.on_chunk_complete(chunk, chunk.index, &result);
                        }
                        TranscriptionResult::Failure { kind, message, .. } => {
                            self.hooks.on_chunk_error(chunk, chunk.index, *kind, message);
                        }
                    }

                    let fatal = matches!(
                        &result,
                        TranscriptionResult::Failure { kind, .. } if kind.aborts_plan()
                    );
                    results.push(result);
                    if fatal {
                        warn!("Authentication rejected; aborting the remaining chunks");
                        aborted = true;
                        break;
                    }
                }
                Err(Interrupted) => {
                    info!("Cancelled after {} chunks", results.len());
                    return DispatchReport {
                        results,
                        outcome: PlanOutcome::Cancelled,
                    };
                }
            }
        }

        let complete =
            !aborted && results.len() == chunks.len() && results.iter().all(|r| r.is_success());
        DispatchReport {
            results,
            outcome: if complete {
                PlanOutcome::Completed
            } else {
                PlanOutcome::PartiallyCompleted
            },
        }
    }

    async fn run_chunk(
        &self,
        file: &Path,
        chunk: &Chunk,
    ) -> std::result::Result<TranscriptionResult, Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted);
        }

        // Extract once; the bytes cannot change between attempts, so an
        // extraction failure is never retried.
        let payload = match self.extractor.extract(file, chunk).await {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(TranscriptionResult::Failure {
                    chunk: chunk.clone(),
                    kind: ErrorKind::Decode,
                    message: e.to_string(),
                });
            }
        };
        debug!("Chunk {} extracted ({} bytes)", chunk.index, payload.bytes.len());

        let max_attempts = self.config.policy.max_attempts;
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Interrupted);
            }

            match self.attempt(&payload).await? {
                Ok(transcript) => {
                    info!(
                        "Chunk {} transcribed: {} words",
                        chunk.index,
                        transcript.words.len()
                    );
                    return Ok(TranscriptionResult::Success {
                        chunk: chunk.clone(),
                        text: transcript.text,
                        words: transcript.words,
                        detected_language: transcript.language,
                        reported_duration: transcript.duration,
                    });
                }
                Err(error) => {
                    let kind = classify(&error);
                    if kind.retryable() && attempt < max_attempts {
                        let delay_ms = self.config.policy.delay_ms(attempt);
                        attempt += 1;
                        self.hooks
                            .on_retry(chunk, chunk.index, attempt, max_attempts, delay_ms, kind);
                        debug!(
                            "Chunk {} attempt {} failed ({}), retrying in {}ms",
                            chunk.index, attempt, kind, delay_ms
                        );
                        if self
                            .cancellable_sleep(Duration::from_millis(delay_ms))
                            .await
                            .is_err()
                        {
                            return Err(Interrupted);
                        }
                        continue;
                    }

                    warn!("Chunk {} failed ({}): {}", chunk.index, kind, error);
                    return Ok(TranscriptionResult::Failure {
                        chunk: chunk.clone(),
                        kind,
                        message: error.to_string(),
                    });
                }
            }
        }
    }

    /// One submission guarded by the per-attempt deadline and cancellation.
    ///
    /// Cancellation drops the in-flight request future, which aborts the
    /// underlying connection.
    async fn attempt(
        &self,
        payload: &ChunkPayload,
    ) -> std::result::Result<std::result::Result<ServiceTranscript, ServiceError>, Interrupted>
    {
        let call = tokio::time::timeout(
            self.config.per_request_timeout,
            self.service
                .transcribe(payload, self.config.language.as_deref()),
        );

        tokio::select! {
            outcome = call => match outcome {
                Ok(inner) => Ok(inner),
                Err(_) => Ok(Err(ServiceError::Timeout)),
            },
            _ = self.cancel.cancelled() => Err(Interrupted),
        }
    }

    /// Sleeps in short slices so cancellation wakes within the poll interval.
    async fn cancellable_sleep(&self, total: Duration) -> std::result::Result<(), Interrupted> {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.cancel.is_cancelled() {
                return Err(Interrupted);
            }
            let slice = remaining.min(Duration::from_millis(CANCEL_POLL_MS));
            sleep(slice).await;
            remaining -= slice;
        }
        if self.cancel.is_cancelled() {
            return Err(Interrupted);
        }
        Ok(())
    }
}
