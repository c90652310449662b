//! Audio probing and chunk extraction.
//!
//! All decoding is delegated to ffmpeg/ffprobe child processes so peak
//! memory stays proportional to the requested window, never the whole file.

pub mod extract;
mod ffmpeg;
pub mod probe;

pub use extract::{ByteSliceExtractor, ChunkExtractor, ChunkPayload, PcmChunkExtractor};
pub use probe::{AudioProbe, FfmpegProbe, Silence};
