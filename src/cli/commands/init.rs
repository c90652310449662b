//! The `init` command: write a default configuration file.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;

pub fn run_init(settings: &Settings) -> Result<()> {
    let path = Settings::default_config_path();

    if path.exists() {
        Output::info(&format!("Configuration already exists at {}", path.display()));
        return Ok(());
    }

    settings.save_to(&path)?;
    Output::success(&format!("Wrote default configuration to {}", path.display()));
    Output::info("Set your API key with: export GROQ_API_KEY='gsk_...'");
    Ok(())
}
