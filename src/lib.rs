//! Skive - Silence-Aware Chunked Transcription
//!
//! A CLI tool and library for transcribing long recordings through a remote
//! speech-to-text service with per-request size limits.
//!
//! The name "Skive" comes from the Norwegian word for "slice."
//!
//! # Overview
//!
//! Remote transcription services cap the duration and byte size of a single
//! request, so a long recording has to be cut into pieces. Skive does this
//! without losing or duplicating words at the seams:
//!
//! - Cut points are placed inside quiet regions, so no word is severed
//! - Each piece is extracted with extra audio on both sides, so boundary
//!   words are heard twice with full context
//! - The per-piece transcripts are merged back into one word stream by
//!   resolving the duplicated overlap regions on word timestamps
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `audio` - Probing (duration, silences, waveform) and chunk extraction
//! - `planner` - Silence-guided chunk planning
//! - `transcription` - Remote service client, dispatch loop, output formats
//! - `merge` - Overlap deduplication of per-chunk word transcripts
//! - `session` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use skive::config::Settings;
//! use skive::session::Session;
//! use skive::transcription::dispatch::NoopLifecycle;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let session = Session::new(settings)?;
//!
//!     let outcome = session
//!         .run(Path::new("lecture.mp3"), &NoopLifecycle, &mut |_| {})
//!         .await?;
//!     println!("{}", outcome.transcript.text);
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod merge;
pub mod planner;
pub mod session;
pub mod transcription;

pub use error::{Result, SkiveError};
