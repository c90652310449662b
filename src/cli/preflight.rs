//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and credentials are available before
//! starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, SkiveError};
use crate::transcription::service::{resolve_api_key, validate_api_key};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Transcription requires decoders and an API key.
    Transcribe,
    /// Planning only needs the decoders.
    Plan,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Transcribe => {
            check_api_key(settings)?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
        Operation::Plan => {
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
    }
    Ok(())
}

/// Check that an API key is present. The shape check is advisory only; a
/// strange-looking key produces a warning, not a failure.
fn check_api_key(settings: &Settings) -> Result<()> {
    let key = resolve_api_key(settings.service.api_key.as_deref()).ok_or_else(|| {
        SkiveError::Config(
            "No API key found. Set it with: export GROQ_API_KEY='gsk_...'".to_string(),
        )
    })?;

    if let Err(e) = validate_api_key(&key) {
        crate::cli::Output::warning(&format!("API key looks unusual: {}", e));
    }
    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash)
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(SkiveError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SkiveError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(SkiveError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_fails_transcribe_preflight() {
        // Only run where the environment cannot supply a key.
        if std::env::var("GROQ_API_KEY").is_ok() || std::env::var("OPENAI_API_KEY").is_ok() {
            return;
        }
        let settings = Settings::default();
        assert!(check_api_key(&settings).is_err());
    }

    #[test]
    fn test_configured_key_passes() {
        let mut settings = Settings::default();
        settings.service.api_key = Some("gsk_0123456789abcdef0123".to_string());
        assert!(check_api_key(&settings).is_ok());
    }
}
