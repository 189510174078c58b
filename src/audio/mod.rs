//! Audio capture, persistence and playback using PipeWire
//!
//! This module provides:
//! - Microphone capture on a background thread with a lock-guarded block buffer
//! - 16-bit PCM WAV encoding and decoding via hound
//! - Playback of decoded recordings through the default output device

mod capture;
mod encoder;
mod loader;
mod playback;

pub use capture::{AudioCapture, CaptureConfig, CapturedAudio, SharedSessionState};
pub use encoder::{encode_blocks, write_wav};
pub use loader::{load_wav, PlaybackBuffer};
pub use playback::{AudioPlayer, SharedPlaybackState};

use std::path::PathBuf;

/// Errors produced by the recording and playback pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("recording already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("no audio captured")]
    NoAudioCaptured,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt recording file: {0}")]
    CorruptFile(String),

    #[error("recording not found: {}", .0.display())]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, AudioError>;
