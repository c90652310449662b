//! Chunk payload extraction.
//!
//! Turns a planned chunk into a self-contained audio blob covering exactly
//! its actual range, in a format the transcription service accepts.

use crate::audio::ffmpeg::{decode_pcm_window, probe_duration, ANALYSIS_SAMPLE_RATE};
use crate::error::{Result, SkiveError};
use crate::planner::Chunk;
use async_trait::async_trait;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, instrument};

/// Frame-alignment guard applied on both sides of a byte-range slice.
const SLICE_GUARD_SECS: f64 = 0.05;

/// A self-contained audio payload for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Produces an uploadable payload for a chunk's actual range.
#[async_trait]
pub trait ChunkExtractor: Send + Sync {
    async fn extract(&self, file: &Path, chunk: &Chunk) -> Result<ChunkPayload>;
}

/// Decodes the chunk's actual range and re-frames it as in-memory WAV.
///
/// Preferred strategy: the decode step removes codec frame boundaries, so
/// the payload covers the sample range exactly.
pub struct PcmChunkExtractor {
    max_bytes: u64,
}

impl PcmChunkExtractor {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl ChunkExtractor for PcmChunkExtractor {
    #[instrument(skip_all, fields(chunk = chunk.index))]
    async fn extract(&self, file: &Path, chunk: &Chunk) -> Result<ChunkPayload> {
        let length = chunk.actual_end - chunk.actual_start;
        let samples = decode_pcm_window(file, chunk.actual_start, length).await?;
        let bytes = write_wav(&samples, ANALYSIS_SAMPLE_RATE)?;
        check_ceiling(chunk, bytes.len() as u64, self.max_bytes)?;

        debug!("Extracted chunk {} ({} bytes)", chunk.index, bytes.len());
        Ok(ChunkPayload {
            file_name: format!("chunk_{:04}.wav", chunk.index),
            mime_type: "audio/wav",
            bytes,
        })
    }
}

/// Slices the container's byte range directly, with a small alignment guard.
///
/// Only valid when the service re-decodes the payload and the container
/// tolerates mid-frame fragments (MP3 and similar framed codecs).
pub struct ByteSliceExtractor {
    max_bytes: u64,
}

impl ByteSliceExtractor {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl ChunkExtractor for ByteSliceExtractor {
    #[instrument(skip_all, fields(chunk = chunk.index))]
    async fn extract(&self, file: &Path, chunk: &Chunk) -> Result<ChunkPayload> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let duration = probe_duration(file).await?;
        let file_size = tokio::fs::metadata(file).await?.len();
        let (start, end) = slice_bounds(file_size, duration, chunk.actual_start, chunk.actual_end);

        let mut handle = tokio::fs::File::open(file).await?;
        handle.seek(std::io::SeekFrom::Start(start)).await?;
        let mut bytes = vec![0u8; (end - start) as usize];
        handle.read_exact(&mut bytes).await?;

        check_ceiling(chunk, bytes.len() as u64, self.max_bytes)?;

        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3");
        Ok(ChunkPayload {
            file_name: format!("chunk_{:04}.{}", chunk.index, ext),
            mime_type: "application/octet-stream",
            bytes,
        })
    }
}

fn check_ceiling(chunk: &Chunk, actual: u64, ceiling: u64) -> Result<()> {
    if actual > ceiling {
        return Err(SkiveError::Decode(format!(
            "chunk {} payload is {} bytes, over the {} byte ceiling",
            chunk.index, actual, ceiling
        )));
    }
    Ok(())
}

/// Byte bounds for a time range, guarded and clamped to the file.
fn slice_bounds(file_size: u64, duration: f64, start_secs: f64, end_secs: f64) -> (u64, u64) {
    if duration <= 0.0 || file_size == 0 {
        return (0, file_size);
    }
    let bytes_per_second = file_size as f64 / duration;
    let start = ((start_secs - SLICE_GUARD_SECS).max(0.0) * bytes_per_second).floor() as u64;
    let end = (((end_secs + SLICE_GUARD_SECS) * bytes_per_second).ceil() as u64).min(file_size);
    (start.min(end), end)
}

/// Frames mono s16 samples as a WAV blob.
fn write_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| SkiveError::Decode(format!("WAV framing failed: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| SkiveError::Decode(format!("WAV framing failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| SkiveError::Decode(format!("WAV framing failed: {}", e)))?;
    }
    Ok(cursor.into_inner())
}
