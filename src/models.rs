#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about a recording on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub file_name: String,
    pub modified: DateTime<Utc>,
    /// Duration read from the WAV header; absent when the header is unreadable
    pub duration_seconds: Option<f64>,
    pub size_bytes: u64,
}

/// Structured outcome of a completed save.
///
/// The payload length of the written container is always
/// `frame_count * channels * 2` bytes.
#[derive(Debug, Clone)]
pub struct EncodedRecording {
    pub path: PathBuf,
    pub frame_count: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl EncodedRecording {
    /// Length of the PCM payload in bytes
    pub fn payload_bytes(&self) -> u64 {
        self.frame_count as u64 * self.channels as u64 * 2
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_length_matches_header_fields() {
        let recording = EncodedRecording {
            path: PathBuf::from("take1.wav"),
            frame_count: 13230,
            sample_rate: 44100,
            channels: 1,
        };
        assert_eq!(recording.payload_bytes(), 26460);
        assert!((recording.duration_seconds() - 0.3).abs() < 1e-9);
    }
}
