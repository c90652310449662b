//! Error types for Skive.

use thiserror::Error;

/// Library-level error type for Skive operations.
#[derive(Error, Debug)]
pub enum SkiveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("Chunk planning failed: {0}")]
    Planner(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Skive operations.
pub type Result<T> = std::result::Result<T, SkiveError>;
