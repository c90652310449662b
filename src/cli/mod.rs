//! CLI module for Skive.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Skive - Silence-Aware Chunked Transcription
///
/// Transcribes long recordings through a remote speech-to-text service by
/// cutting them at silences, overlapping the pieces, and merging the results
/// back into one transcript. The name comes from the Norwegian word for
/// "slice."
#[derive(Parser, Debug)]
#[command(name = "skive")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe an audio or video file
    Transcribe {
        /// Path to the recording
        file: String,

        /// Write the transcript to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (json, srt, vtt, txt)
        #[arg(long, default_value = "txt")]
        format: String,

        /// Language hint (ISO 639-1 code, e.g. "en")
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Show the chunk plan for a file without transcribing
    Plan {
        /// Path to the recording
        file: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Write a default configuration file
    Init,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "planner.chunk_length_seconds")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}
