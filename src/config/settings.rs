//! Configuration settings for Skive.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub service: ServiceSettings,
    pub planner: PlannerSettings,
    pub retry: RetrySettings,
    pub dispatch: DispatchSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Remote transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Base URL of the OpenAI-compatible transcription endpoint.
    pub api_base: String,
    /// Transcription model to request.
    pub model: String,
    /// Language hint (ISO 639-1 code). None lets the service detect.
    pub language: Option<String>,
    /// API key. Falls back to GROQ_API_KEY / OPENAI_API_KEY when unset.
    pub api_key: Option<String>,
    /// Per-payload byte ceiling enforced before upload.
    pub max_chunk_bytes: u64,
    /// Hard deadline for a single submission attempt, in milliseconds.
    pub per_request_timeout_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            model: "whisper-large-v3".to_string(),
            language: None,
            api_key: None,
            max_chunk_bytes: 25 * 1024 * 1024,
            per_request_timeout_ms: 120_000,
        }
    }
}

/// Chunk planning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Target logical chunk length in seconds.
    pub chunk_length_seconds: f64,
    /// Per-side extension into the neighboring chunk, in seconds.
    pub overlap_seconds: f64,
    /// Half-width of the silence search window around each ideal cut.
    pub silence_window_seconds: f64,
    /// An analysis frame is "silent" when its RMS is below this.
    pub rms_threshold: f32,
    /// Minimum quiet run length that counts as a silence, in milliseconds.
    pub min_silence_duration_ms: u64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            chunk_length_seconds: 600.0,
            overlap_seconds: 10.0,
            silence_window_seconds: 30.0,
            rms_threshold: 0.01,
            min_silence_duration_ms: 300,
        }
    }
}

/// Retry and backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the initial attempt.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Backoff growth factor.
    pub multiplier: f64,
    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 60_000,
        }
    }
}

/// Dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Quiescent pause between chunks, in milliseconds.
    pub inter_chunk_delay_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            inter_chunk_delay_ms: 500,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SkiveError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skive")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}
