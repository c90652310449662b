//! Pipeline coordination for Skive.
//!
//! A session owns every moving part of one transcription run: probe,
//! planner, dispatcher and merger, plus the run's cancellation flag.
//! Nothing in the pipeline is process-global.

use crate::audio::extract::{ChunkExtractor, PcmChunkExtractor};
use crate::audio::probe::{AudioProbe, FfmpegProbe};
use crate::config::Settings;
use crate::error::{Result, SkiveError};
use crate::merge::{merge, MergedTranscript};
use crate::planner::{plan_with_progress, Chunk, PlannerConfig};
use crate::transcription::dispatch::{
    CancelToken, ChunkLifecycle, DispatchConfig, DispatchReport, Dispatcher,
};
use crate::transcription::models::RetryPolicy;
use crate::transcription::service::{resolve_api_key, HttpSpeechService, TranscriptionService};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Everything one run produced.
pub struct SessionOutcome {
    pub chunks: Vec<Chunk>,
    pub report: DispatchReport,
    pub transcript: MergedTranscript,
}

/// The main coordinator for the Skive pipeline.
pub struct Session {
    settings: Settings,
    probe: Arc<dyn AudioProbe>,
    extractor: Arc<dyn ChunkExtractor>,
    service: Arc<dyn TranscriptionService>,
    cancel: CancelToken,
}

impl Session {
    /// Create a session with the default ffmpeg-backed components.
    pub fn new(settings: Settings) -> Result<Self> {
        let api_key = resolve_api_key(settings.service.api_key.as_deref()).ok_or_else(|| {
            SkiveError::Config(
                "No API key configured. Set GROQ_API_KEY or [service].api_key.".into(),
            )
        })?;

        let service = Arc::new(HttpSpeechService::new(
            &settings.service.api_base,
            &api_key,
            &settings.service.model,
            Duration::from_millis(settings.service.per_request_timeout_ms),
        )?);
        let extractor = Arc::new(PcmChunkExtractor::new(settings.service.max_chunk_bytes));

        Ok(Self {
            probe: Arc::new(FfmpegProbe),
            extractor,
            service,
            cancel: CancelToken::new(),
            settings,
        })
    }

    /// Create a session with custom components.
    pub fn with_components(
        settings: Settings,
        probe: Arc<dyn AudioProbe>,
        extractor: Arc<dyn ChunkExtractor>,
        service: Arc<dyn TranscriptionService>,
    ) -> Self {
        Self {
            settings,
            probe,
            extractor,
            service,
            cancel: CancelToken::new(),
        }
    }

    /// Handle for cancelling this session from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Plan the file without transcribing anything.
    pub async fn plan_only(
        &self,
        file: &Path,
        progress: &mut dyn FnMut(f64),
    ) -> Result<Vec<Chunk>> {
        let config = PlannerConfig::from(&self.settings.planner);
        plan_with_progress(self.probe.as_ref(), file, &config, progress).await
    }

    /// Run the full pipeline: plan, dispatch every chunk, merge the results.
    ///
    /// `progress` receives planning progress in [0, 100]; per-chunk progress
    /// arrives through the lifecycle hooks. Cancellation yields the partial
    /// results accumulated so far.
    #[instrument(skip_all, fields(file = %file.display()))]
    pub async fn run(
        &self,
        file: &Path,
        hooks: &dyn ChunkLifecycle,
        progress: &mut dyn FnMut(f64),
    ) -> Result<SessionOutcome> {
        let chunks = self.plan_only(file, progress).await?;
        info!("Planned {} chunks", chunks.len());
        self.transcribe_planned(file, chunks, hooks).await
    }

    /// Dispatch an existing plan and merge the results.
    pub async fn transcribe_planned(
        &self,
        file: &Path,
        chunks: Vec<Chunk>,
        hooks: &dyn ChunkLifecycle,
    ) -> Result<SessionOutcome> {
        let dispatcher = Dispatcher::new(
            self.service.as_ref(),
            self.extractor.as_ref(),
            hooks,
            self.cancel.clone(),
            DispatchConfig {
                policy: RetryPolicy::from(&self.settings.retry),
                per_request_timeout: Duration::from_millis(
                    self.settings.service.per_request_timeout_ms,
                ),
                inter_chunk_delay: Duration::from_millis(
                    self.settings.dispatch.inter_chunk_delay_ms,
                ),
                language: self.settings.service.language.clone(),
            },
        );
        let report = dispatcher.transcribe_all(file, &chunks).await;
        info!(
            "Dispatch finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );

        let transcript = merge(&report.results, self.settings.planner.overlap_seconds);

        Ok(SessionOutcome {
            chunks,
            report,
            transcript,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::extract::ChunkPayload;
    use crate::audio::probe::Silence;
    use crate::error::Result;
    use crate::transcription::classify::ServiceError;
    use crate::transcription::dispatch::{NoopLifecycle, PlanOutcome};
    use crate::transcription::models::ServiceTranscript;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct FixedProbe {
        duration: f64,
    }

    #[async_trait]
    impl AudioProbe for FixedProbe {
        async fn duration(&self, _file: &Path) -> Result<f64> {
            Ok(self.duration)
        }

        async fn silences_in_window(
            &self,
            _file: &Path,
            _center: f64,
            _window_seconds: f64,
            _rms_threshold: f32,
            _min_silence_ms: u64,
        ) -> Result<Vec<Silence>> {
            Ok(Vec::new())
        }

        async fn waveform(&self, _file: &Path, _num_points: usize) -> Result<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    struct StubExtractor;

    #[async_trait]
    impl ChunkExtractor for StubExtractor {
        async fn extract(&self, _file: &Path, chunk: &Chunk) -> Result<ChunkPayload> {
            Ok(ChunkPayload {
                file_name: format!("chunk_{:04}.wav", chunk.index),
                mime_type: "audio/wav",
                bytes: vec![0; 8],
            })
        }
    }

    /// Service that reports one word spanning the chunk's payload midpoint.
    struct EchoService;

    #[async_trait]
    impl TranscriptionService for EchoService {
        async fn transcribe(
            &self,
            payload: &ChunkPayload,
            _language: Option<&str>,
        ) -> std::result::Result<ServiceTranscript, ServiceError> {
            serde_json::from_value(serde_json::json!({
                "text": payload.file_name.clone(),
                "duration": 1.0,
                "language": "en",
                "words": [{"word": payload.file_name.clone(), "start": 1.0, "end": 2.0}],
            }))
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
        }
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.planner.chunk_length_seconds = 600.0;
        settings.dispatch.inter_chunk_delay_ms = 0;
        settings
    }

    #[tokio::test]
    async fn test_session_runs_end_to_end() {
        let session = Session::with_components(
            settings(),
            Arc::new(FixedProbe { duration: 1500.0 }),
            Arc::new(StubExtractor),
            Arc::new(EchoService),
        );

        let outcome = session
            .run(&PathBuf::from("talk.mp3"), &NoopLifecycle, &mut |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.chunks.len(), 3);
        assert_eq!(outcome.report.outcome, PlanOutcome::Completed);
        assert_eq!(outcome.report.succeeded(), 3);
        assert_eq!(outcome.transcript.words.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_session_returns_partial_outcome() {
        let session = Session::with_components(
            settings(),
            Arc::new(FixedProbe { duration: 1500.0 }),
            Arc::new(StubExtractor),
            Arc::new(EchoService),
        );
        session.cancel_token().cancel();

        let outcome = session
            .run(&PathBuf::from("talk.mp3"), &NoopLifecycle, &mut |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.report.outcome, PlanOutcome::Cancelled);
        assert!(outcome.report.results.is_empty());
        assert!(outcome.transcript.text.is_empty());
    }

    #[tokio::test]
    async fn test_plan_only_does_not_touch_service() {
        let session = Session::with_components(
            settings(),
            Arc::new(FixedProbe { duration: 900.0 }),
            Arc::new(StubExtractor),
            Arc::new(EchoService),
        );

        let chunks = session
            .plan_only(&PathBuf::from("talk.mp3"), &mut |_| {})
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
    }
}
