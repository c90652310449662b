//! External decoder plumbing (ffmpeg/ffprobe).

use crate::error::{Result, SkiveError};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Sample rate of all decoded analysis/payload PCM.
pub const ANALYSIS_SAMPLE_RATE: u32 = 16_000;

/// Queries the duration of an audio file using ffprobe with JSON output.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SkiveError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(SkiveError::Decode(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(SkiveError::Decode(format!(
            "ffprobe could not parse {}",
            path.display()
        )));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| SkiveError::Decode("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| SkiveError::Decode("Could not determine audio duration".into()))
}

/// Decodes `[start, start + length)` seconds to 16 kHz mono s16 PCM.
///
/// Seeks before opening the input so only the requested window is decoded.
pub async fn decode_pcm_window(path: &Path, start: f64, length: f64) -> Result<Vec<i16>> {
    debug!("Decoding {:.3}s window at {:.3}s", length, start);

    let result = Command::new("ffmpeg")
        .arg("-v").arg("error")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-i").arg(path)
        .arg("-f").arg("s16le")
        .arg("-acodec").arg("pcm_s16le")
        .arg("-ac").arg("1")
        .arg("-ar").arg(ANALYSIS_SAMPLE_RATE.to_string())
        .arg("-")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SkiveError::ToolNotFound("ffmpeg".into()));
        }
        Err(e) => {
            return Err(SkiveError::Decode(format!("ffmpeg failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SkiveError::Decode(format!(
            "ffmpeg could not decode {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    Ok(bytes_to_samples(&output.stdout))
}

/// Interprets raw little-endian s16 bytes as samples, ignoring a trailing odd byte.
fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_samples_little_endian() {
        let bytes = [0x01, 0x00, 0xFF, 0x7F, 0x00, 0x80];
        assert_eq!(bytes_to_samples(&bytes), vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_bytes_to_samples_drops_trailing_byte() {
        let bytes = [0x01, 0x00, 0xAB];
        assert_eq!(bytes_to_samples(&bytes), vec![1]);
    }

    #[test]
    fn test_bytes_to_samples_empty() {
        assert!(bytes_to_samples(&[]).is_empty());
    }
}
