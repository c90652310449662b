//! The `doctor` command: check tools and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::transcription::service::{resolve_api_key, validate_api_key};
use std::process::Command;

pub fn run_doctor(settings: &Settings) -> Result<()> {
    Output::header("System check");

    for tool in ["ffmpeg", "ffprobe"] {
        match Command::new(tool).arg("-version").output() {
            Ok(output) if output.status.success() => {
                Output::list_item(&format!("{}: ok", tool));
            }
            _ => {
                Output::list_item(&format!("{}: MISSING (install it and add to PATH)", tool));
            }
        }
    }

    match resolve_api_key(settings.service.api_key.as_deref()) {
        Some(key) => match validate_api_key(&key) {
            Ok(()) => Output::list_item("API key: ok"),
            Err(e) => Output::list_item(&format!("API key: present but unusual ({})", e)),
        },
        None => Output::list_item("API key: MISSING (set GROQ_API_KEY or [service].api_key)"),
    }

    Output::header("Configuration");
    Output::kv("config file", &Settings::default_config_path().display().to_string());
    Output::kv("service", &settings.service.api_base);
    Output::kv("model", &settings.service.model);
    Output::kv(
        "chunking",
        &format!(
            "{}s chunks, {}s overlap",
            settings.planner.chunk_length_seconds, settings.planner.overlap_seconds
        ),
    );

    Ok(())
}
