//! Remote speech-to-text client.
//!
//! Speaks the OpenAI-compatible `audio/transcriptions` multipart protocol
//! and reports transport failures as [`ServiceError`] values so the
//! dispatcher can classify them.

use crate::audio::extract::ChunkPayload;
use crate::error::{Result, SkiveError};
use crate::transcription::classify::ServiceError;
use crate::transcription::models::ServiceTranscript;
use async_trait::async_trait;
use reqwest::multipart;
use std::time::Duration;
use tracing::{debug, warn};

/// Key prefixes the advisory validator recognizes.
const KEY_PREFIXES: &[&str] = &["gsk_", "sk-"];

/// Shortest plausible API key.
const MIN_KEY_LEN: usize = 20;

/// One submission of a chunk payload to the speech service.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        language: Option<&str>,
    ) -> std::result::Result<ServiceTranscript, ServiceError>;
}

/// HTTP client for an OpenAI-compatible transcription endpoint.
pub struct HttpSpeechService {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpSpeechService {
    /// Create a client with a request timeout backstop.
    ///
    /// The key is checked only advisorily; the service's response stays
    /// authoritative.
    pub fn new(api_base: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        if let Err(e) = validate_api_key(api_key) {
            warn!("API key looks unusual: {}", e);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TranscriptionService for HttpSpeechService {
    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        language: Option<&str>,
    ) -> std::result::Result<ServiceTranscript, ServiceError> {
        debug!(
            "Submitting {} ({} bytes) to {}",
            payload.file_name,
            payload.bytes.len(),
            self.model
        );

        let file_part = multipart::Part::bytes(payload.bytes.clone())
            .file_name(payload.file_name.clone())
            .mime_str(payload.mime_type)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word");
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        response
            .json::<ServiceTranscript>()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

fn map_transport_error(error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Network(error.to_string())
    }
}

/// Prefers the service's own `error.message` when the body carries one.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Advisory credential check.
pub fn validate_api_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(SkiveError::Config("API key is empty".into()));
    }
    if key.len() < MIN_KEY_LEN {
        return Err(SkiveError::Config(format!(
            "API key is shorter than {} characters",
            MIN_KEY_LEN
        )));
    }
    if !KEY_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
        return Err(SkiveError::Config(
            "API key does not start with a recognized prefix".into(),
        ));
    }
    Ok(())
}

/// Resolves the API key from settings or the environment.
pub fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    configured
        .map(str::to_string)
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var("GROQ_API_KEY").ok().filter(|key| !key.is_empty()))
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty()))
}
