//! Recording sessions: capture, encode, save
//!
//! Ties the capture session and the WAV encoder together behind the
//! start/stop surface the view layer drives.

use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::{
    encode_blocks, write_wav, AudioCapture, AudioError, CaptureConfig, Result, SharedSessionState,
};
use crate::models::EncodedRecording;
use crate::settings::Settings;

/// Extension every recording container carries
pub const RECORDING_EXT: &str = "wav";

/// One recorder, at most one active session at a time
pub struct Recorder {
    capture: AudioCapture,
    config: CaptureConfig,
    recordings_dir: PathBuf,
    /// Target path of the active session, if any
    target: Option<PathBuf>,
}

impl Recorder {
    /// Create a recorder from application settings
    pub fn new(settings: &Settings) -> Self {
        let config = CaptureConfig {
            sample_rate: settings.sample_rate,
            channels: settings.channels,
        };
        Self {
            capture: AudioCapture::new(config),
            config,
            recordings_dir: settings.recordings_dir.clone(),
            target: None,
        }
    }

    /// Check if a session is active
    pub fn is_recording(&self) -> bool {
        self.capture.is_running()
    }

    /// Shared capture state for progress reporting
    pub fn session_state(&self) -> SharedSessionState {
        self.capture.shared_state()
    }

    /// Directory recordings are saved into
    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Start a new recording session.
    ///
    /// `name` gains the `.wav` extension when absent; with no name a
    /// timestamped one is generated. An existing file at the target is
    /// never overwritten - the call fails before any capture starts.
    pub fn start(&mut self, name: Option<&str>) -> Result<PathBuf> {
        if self.capture.is_running() {
            return Err(AudioError::AlreadyRecording);
        }

        let path = self.resolve_target(name)?;
        fs::create_dir_all(&self.recordings_dir)?;

        self.capture.start()?;
        self.target = Some(path.clone());

        log::info!(
            "recording to {} ({} Hz, {} ch)",
            path.display(),
            self.config.sample_rate,
            self.config.channels
        );
        Ok(path)
    }

    /// Stop the active session, encode it and write the container.
    ///
    /// Blocks until the capture thread has exited, so the buffer is
    /// complete and stable before encoding begins. On an idle recorder
    /// this is the defined no-op: `NoAudioCaptured`.
    pub fn stop(&mut self) -> Result<EncodedRecording> {
        let Some(target) = self.target.take() else {
            return Err(AudioError::NoAudioCaptured);
        };

        let session = self.capture.stop()?;
        if session.blocks.is_empty() {
            return Err(AudioError::NoAudioCaptured);
        }

        let pcm = encode_blocks(&session.blocks);
        write_wav(&target, &pcm, session.sample_rate, session.channels)?;

        let frame_count = (pcm.len() / session.channels.max(1) as usize) as u32;
        log::info!("saved {} ({} frames)", target.display(), frame_count);

        Ok(EncodedRecording {
            path: target,
            frame_count,
            sample_rate: session.sample_rate,
            channels: session.channels,
        })
    }

    /// Resolve a caller-supplied name to the session's target path
    fn resolve_target(&self, name: Option<&str>) -> Result<PathBuf> {
        let file_name = match name {
            Some(name) => ensure_extension(name),
            None => generate_filename(),
        };

        let path = self.recordings_dir.join(file_name);
        if path.exists() {
            return Err(AudioError::AlreadyExists(path));
        }
        Ok(path)
    }
}

/// Append the recording extension unless the name already carries it
pub fn ensure_extension(name: &str) -> String {
    let suffix = format!(".{}", RECORDING_EXT);
    if name.to_lowercase().ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Generate a unique filename for an unnamed recording
fn generate_filename() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let uuid = uuid::Uuid::new_v4().to_string()[..8].to_string();
    format!("recording_{}_{}.{}", timestamp, uuid, RECORDING_EXT)
}
