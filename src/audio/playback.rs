//! Audio playback using PipeWire
//!
//! Plays a decoded recording through the default output device at the
//! rate and channel count it was encoded with.

#![allow(dead_code)]

use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::{AudioError, PlaybackBuffer, Result};

/// Shared state for audio playback - thread-safe
#[derive(Clone)]
pub struct SharedPlaybackState {
    inner: Arc<Mutex<PlaybackInner>>,
}

struct PlaybackInner {
    /// Float samples to play, interleaved
    samples: Vec<f32>,
    /// Sample rate of the loaded recording
    sample_rate: u32,
    /// Channel count of the loaded recording
    channels: u16,
    /// Current playback position (sample index)
    position: usize,
    /// Total duration in seconds
    duration: f64,
    /// Is playback active
    is_playing: bool,
    /// Error from the playback loop, if any
    error: Option<String>,
}

impl SharedPlaybackState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlaybackInner {
                samples: Vec::new(),
                sample_rate: 44100,
                channels: 1,
                position: 0,
                duration: 0.0,
                is_playing: false,
                error: None,
            })),
        }
    }

    /// Replace the loaded audio with a freshly decoded recording
    pub fn load(&self, buffer: &PlaybackBuffer) {
        let mut inner = self.inner.lock().unwrap();
        inner.duration = buffer.duration_seconds();
        inner.samples = buffer.to_f32();
        inner.sample_rate = buffer.sample_rate;
        inner.channels = buffer.channels;
        inner.position = 0;
        inner.error = None;
    }

    /// Get current playback position in seconds
    pub fn current_time(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        let frames = inner.position / inner.channels.max(1) as usize;
        frames as f64 / inner.sample_rate as f64
    }

    /// Get total duration in seconds
    pub fn duration(&self) -> f64 {
        self.inner.lock().unwrap().duration
    }

    /// Check if playback is active
    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().is_playing
    }

    /// Check whether a recording is loaded
    pub fn has_audio(&self) -> bool {
        !self.inner.lock().unwrap().samples.is_empty()
    }

    /// Get playback progress as fraction (0.0 - 1.0)
    pub fn progress(&self) -> f32 {
        let inner = self.inner.lock().unwrap();
        if inner.samples.is_empty() {
            0.0
        } else {
            inner.position as f32 / inner.samples.len() as f32
        }
    }

    fn format(&self) -> (u32, u16) {
        let inner = self.inner.lock().unwrap();
        (inner.sample_rate, inner.channels)
    }

    fn set_playing(&self, playing: bool) {
        self.inner.lock().unwrap().is_playing = playing;
    }

    fn set_error(&self, error: String) {
        self.inner.lock().unwrap().error = Some(error);
    }

    fn take_error(&self) -> Option<String> {
        self.inner.lock().unwrap().error.take()
    }

    /// Reset playback position to start
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.position = 0;
        inner.is_playing = false;
    }

    /// Get samples for playback (advances position)
    fn get_samples(&self, count: usize) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.position >= inner.samples.len() {
            inner.is_playing = false;
            return None;
        }

        let end = (inner.position + count).min(inner.samples.len());
        let samples = inner.samples[inner.position..end].to_vec();
        inner.position = end;

        if inner.position >= inner.samples.len() {
            inner.is_playing = false;
        }

        Some(samples)
    }
}

impl Default for SharedPlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio player using PipeWire
pub struct AudioPlayer {
    state: SharedPlaybackState,
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sender: Option<pw::channel::Sender<PlaybackCommand>>,
}

enum PlaybackCommand {
    Stop,
}

impl AudioPlayer {
    /// Create a new audio player
    pub fn new() -> Self {
        Self {
            state: SharedPlaybackState::new(),
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sender: None,
        }
    }

    /// Get shared playback state for progress reporting
    pub fn shared_state(&self) -> SharedPlaybackState {
        self.state.clone()
    }

    /// Check if playback is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Load a decoded recording for playback
    pub fn load(&self, buffer: &PlaybackBuffer) {
        self.state.load(buffer);
    }

    /// Start playback on a background thread
    pub fn play(&mut self) -> Result<()> {
        if self.is_running.load(Ordering::SeqCst) {
            return Err(AudioError::Device("playback already running".to_string()));
        }

        // Restart from the top if the last run played to the end
        if self.state.progress() >= 1.0 {
            self.state.reset();
        }

        self.state.set_playing(true);
        self.is_running.store(true, Ordering::SeqCst);

        let state = self.state.clone();
        let is_running = self.is_running.clone();

        // Create channel for stopping the loop
        let (sender, receiver) = pw::channel::channel::<PlaybackCommand>();
        self.sender = Some(sender);

        let handle = thread::spawn(move || {
            if let Err(e) = run_playback_loop(state.clone(), receiver) {
                log::error!("playback loop failed: {}", e);
                state.set_error(e);
            }
            state.set_playing(false);
            is_running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Block until playback runs to completion (or fails).
    pub fn wait(&mut self) -> Result<()> {
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.sender.take();
        self.is_running.store(false, Ordering::SeqCst);

        match self.state.take_error() {
            Some(error) => Err(AudioError::Device(error)),
            None => Ok(()),
        }
    }

    /// Stop playback early
    pub fn stop(&mut self) {
        if !self.is_running.load(Ordering::SeqCst) {
            return;
        }

        // Send stop command
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(PlaybackCommand::Stop);
        }

        // Wait for thread to finish
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        self.is_running.store(false, Ordering::SeqCst);
        self.state.set_playing(false);
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the PipeWire playback loop in a background thread
fn run_playback_loop(
    state: SharedPlaybackState,
    receiver: pw::channel::Receiver<PlaybackCommand>,
) -> std::result::Result<(), String> {
    pw::init();

    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;

    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

    // Set up channel receiver to stop the loop
    let mainloop_weak = mainloop.downgrade();
    let _receiver = receiver.attach(mainloop.loop_(), move |cmd| match cmd {
        PlaybackCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    // User data for the stream callbacks
    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedPlaybackState,
        mainloop_weak: pw::main_loop::MainLoopWeak,
    }

    let user_data = UserData {
        format: Default::default(),
        state: state.clone(),
        mainloop_weak: mainloop.downgrade(),
    };

    // Create playback stream
    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Playback",
        *pw::keys::MEDIA_ROLE => "Music",
        *pw::keys::APP_NAME => "Patter Voice Recorder",
    };

    let stream = pw::stream::StreamBox::new(&core, "patter-playback", props)
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

    let _listener = stream
        .add_local_listener_with_user_data(user_data)
        .param_changed(|_, user_data, id, param| {
            let Some(param) = param else { return };
            if id != spa::param::ParamType::Format.as_raw() {
                return;
            }

            let (media_type, media_subtype) = match format_utils::parse_format(param) {
                Ok(v) => v,
                Err(_) => return,
            };

            if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
                return;
            }

            if let Err(e) = user_data.format.parse(param) {
                log::warn!("failed to parse negotiated audio format: {:?}", e);
            }
        })
        .process(|stream, user_data| {
            let Some(mut buffer) = stream.dequeue_buffer() else {
                return;
            };

            let datas = buffer.datas_mut();
            if datas.is_empty() {
                return;
            }

            let data = &mut datas[0];
            let n_channels = user_data.format.channels().max(1) as usize;
            let sample_size = std::mem::size_of::<f32>();
            let stride = sample_size * n_channels;

            let Some(slice) = data.data() else {
                return;
            };

            let n_frames = slice.len() / stride;

            // Pull the next chunk of interleaved samples from our buffer
            let samples = user_data.state.get_samples(n_frames * n_channels);

            match samples {
                Some(samples) => {
                    for (i, &sample) in samples.iter().enumerate() {
                        let offset = i * sample_size;
                        if offset + sample_size <= slice.len() {
                            slice[offset..offset + sample_size]
                                .copy_from_slice(&sample.to_le_bytes());
                        }
                    }
                    // Fill remainder with silence
                    let written = samples.len() * sample_size;
                    if written < slice.len() {
                        slice[written..].fill(0);
                    }

                    let n_full_frames = samples.len() / n_channels;
                    let chunk = data.chunk_mut();
                    *chunk.offset_mut() = 0;
                    *chunk.stride_mut() = stride as i32;
                    *chunk.size_mut() = (n_full_frames * stride) as u32;
                }
                None => {
                    // Buffer exhausted - stop playback
                    if let Some(mainloop) = user_data.mainloop_weak.upgrade() {
                        mainloop.quit();
                    }
                }
            }
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    // Request F32LE at the recording's rate and channel count
    let (sample_rate, channels) = state.format();
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(sample_rate);
    audio_info.set_channels(channels as u32);

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    let values: Vec<u8> = spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize audio format: {:?}", e))?
    .0
    .into_inner();

    let mut params = [Pod::from_bytes(&values)
        .ok_or_else(|| String::from("Failed to build audio format pod"))?];

    // Connect the stream (Output direction for playback)
    stream
        .connect(
            spa::utils::Direction::Output,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    // Run until stopped or playback ends
    mainloop.run();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(samples: Vec<i16>, sample_rate: u32, channels: u16) -> PlaybackBuffer {
        PlaybackBuffer {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn handout_advances_position_and_flags_completion() {
        let state = SharedPlaybackState::new();
        state.load(&buffer(vec![0i16; 100], 44100, 1));
        state.set_playing(true);

        let first = state.get_samples(60).unwrap();
        assert_eq!(first.len(), 60);
        assert!(state.is_playing());

        let second = state.get_samples(60).unwrap();
        assert_eq!(second.len(), 40);
        assert!(!state.is_playing());

        assert!(state.get_samples(60).is_none());
    }

    #[test]
    fn load_replaces_previous_buffer() {
        let state = SharedPlaybackState::new();
        state.load(&buffer(vec![0i16; 100], 44100, 1));
        let _ = state.get_samples(50);

        state.load(&buffer(vec![0i16; 10], 22050, 2));
        assert_eq!(state.progress(), 0.0);
        let all = state.get_samples(100).unwrap();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn duration_tracks_loaded_recording() {
        let state = SharedPlaybackState::new();
        state.load(&buffer(vec![0i16; 44100], 44100, 1));
        assert!((state.duration() - 1.0).abs() < 1e-9);

        state.load(&buffer(vec![0i16; 44100], 44100, 2));
        assert!((state.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_player_reports_no_audio() {
        let state = SharedPlaybackState::new();
        assert!(!state.has_audio());
        assert_eq!(state.progress(), 0.0);
    }
}
