//! Audio capture using PipeWire
//!
//! Provides microphone capture into a thread-safe block buffer.

use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::{AudioError, Result};

/// Audio capture configuration
#[derive(Clone, Copy, Debug)]
pub struct CaptureConfig {
    /// Sample rate (default: 44100)
    pub sample_rate: u32,
    /// Number of channels (default: 1 for mono)
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
        }
    }
}

/// Everything a finished capture session hands back to the caller.
#[derive(Debug)]
pub struct CapturedAudio {
    /// Sample blocks in arrival order, one per device callback
    pub blocks: Vec<Vec<f32>>,
    /// Sample rate the stream was negotiated at
    pub sample_rate: u32,
    /// Channel count the stream was negotiated at
    pub channels: u16,
}

/// Shared state for one capture session - thread-safe
///
/// The recording flag and the block buffer live behind the same mutex:
/// a block that races a stop request is appended whole or not at all.
#[derive(Clone)]
pub struct SharedSessionState {
    inner: Arc<Mutex<SessionInner>>,
}

struct SessionInner {
    /// Captured sample blocks in arrival order
    blocks: Vec<Vec<f32>>,
    /// Producer-visible recording flag; cleared by `halt`
    recording: bool,
    /// Sample rate reported by the stream
    sample_rate: u32,
    /// Channel count reported by the stream
    channels: u16,
    /// Error message from the capture loop, if any
    error: Option<String>,
}

impl SharedSessionState {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                blocks: Vec::new(),
                recording: false,
                sample_rate: config.sample_rate,
                channels: config.channels,
                error: None,
            })),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.inner.lock().unwrap().recording
    }

    pub fn block_count(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    /// Seconds of audio accumulated so far
    pub fn duration(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        let samples: usize = inner.blocks.iter().map(Vec::len).sum();
        samples as f64 / (inner.sample_rate as f64 * inner.channels.max(1) as f64)
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().unwrap().error.clone()
    }

    /// Clear the buffer and arm the recording flag for a new session
    pub fn arm(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.clear();
        inner.error = None;
        inner.recording = true;
    }

    /// Clear the recording flag; blocks arriving after this are dropped
    pub fn halt(&self) {
        self.inner.lock().unwrap().recording = false;
    }

    pub fn set_error(&self, error: String) {
        let mut inner = self.inner.lock().unwrap();
        inner.error = Some(error);
        inner.recording = false;
    }

    /// Append one device callback's worth of interleaved samples.
    ///
    /// The flag check and the append share the critical section, so a
    /// block delivered concurrently with `halt` is either fully included
    /// or fully excluded. No I/O happens while the lock is held.
    pub fn push_block(&self, block: Vec<f32>, sample_rate: u32, channels: u16) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.recording {
            return;
        }
        inner.sample_rate = sample_rate;
        inner.channels = channels;
        inner.blocks.push(block);
    }

    /// Take the finished session out of the state, leaving it empty
    pub fn take(&self) -> CapturedAudio {
        let mut inner = self.inner.lock().unwrap();
        CapturedAudio {
            blocks: std::mem::take(&mut inner.blocks),
            sample_rate: inner.sample_rate,
            channels: inner.channels,
        }
    }
}

/// Audio capture manager using PipeWire
pub struct AudioCapture {
    config: CaptureConfig,
    state: SharedSessionState,
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sender: Option<pw::channel::Sender<PipeWireCommand>>,
}

enum PipeWireCommand {
    Stop,
}

impl AudioCapture {
    /// Create a new audio capture instance
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: SharedSessionState::new(config),
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sender: None,
        }
    }

    /// Get shared session state for progress reporting
    pub fn shared_state(&self) -> SharedSessionState {
        self.state.clone()
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Start capturing audio from the default input device
    pub fn start(&mut self) -> Result<()> {
        if self.is_running.load(Ordering::SeqCst) {
            return Err(AudioError::AlreadyRecording);
        }

        self.state.arm();
        self.is_running.store(true, Ordering::SeqCst);

        let config = self.config;
        let state = self.state.clone();
        let is_running = self.is_running.clone();

        // Create channel for stopping the loop
        let (sender, receiver) = pw::channel::channel::<PipeWireCommand>();
        self.sender = Some(sender);

        let handle = thread::spawn(move || {
            if let Err(e) = run_capture_loop(config, state.clone(), receiver) {
                log::error!("capture loop failed: {}", e);
                state.set_error(e);
            }
            is_running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing and return the accumulated session.
    ///
    /// Clears the recording flag first, then joins the capture thread:
    /// once this returns, no further blocks can be appended. A device
    /// failure inside the loop surfaces here as `Device`.
    pub fn stop(&mut self) -> Result<CapturedAudio> {
        self.state.halt();

        // Ask the PipeWire main loop to quit
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(PipeWireCommand::Stop);
        }

        // Wait for the capture thread to release the device and exit
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        self.is_running.store(false, Ordering::SeqCst);

        if let Some(error) = self.state.error() {
            // Drain the partial session so the next start is clean
            let _ = self.state.take();
            return Err(AudioError::Device(error));
        }

        Ok(self.state.take())
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if self.is_running.load(Ordering::SeqCst) {
            let _ = self.stop();
        }
    }
}

/// Run the PipeWire capture loop in a background thread
fn run_capture_loop(
    config: CaptureConfig,
    state: SharedSessionState,
    receiver: pw::channel::Receiver<PipeWireCommand>,
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
        PipeWireCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    // User data for the stream callbacks
    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedSessionState,
    }

    let user_data = UserData {
        format: Default::default(),
        state: state.clone(),
    };

    // Create capture stream
    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Capture",
        *pw::keys::MEDIA_ROLE => "Production",
        *pw::keys::APP_NAME => "Patter Voice Recorder",
    };

    let stream = pw::stream::StreamBox::new(&core, "patter-capture", props)
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
            let channels = user_data.format.channels().max(1) as u16;
            let sample_rate = user_data.format.rate();
            let n_bytes = data.chunk().size() as usize;

            if let Some(raw) = data.data() {
                let raw = &raw[..n_bytes.min(raw.len())];

                // One block per callback, interleaved samples in delivery order
                let mut block = Vec::with_capacity(raw.len() / std::mem::size_of::<f32>());
                for bytes in raw.chunks_exact(std::mem::size_of::<f32>()) {
                    block.push(f32::from_le_bytes(bytes.try_into().unwrap_or([0; 4])));
                }

                if !block.is_empty() {
                    user_data.state.push_block(block, sample_rate, channels);
                }
            }
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    // Request F32LE at the configured rate and channel count
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(config.sample_rate);
    audio_info.set_channels(config.channels as u32);

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

    // Connect the stream
    stream
        .connect(
            spa::utils::Direction::Input,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    // Run until stopped
    mainloop.run();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn blocks_race_a_halt_whole_or_not_at_all() {
        let state = SharedSessionState::new(CaptureConfig::default());
        state.arm();

        let producer_state = state.clone();
        let producer = thread::spawn(move || {
            let mut delivered = 0usize;
            while producer_state.is_recording() {
                producer_state.push_block(vec![0.25; 512], 44100, 1);
                delivered += 1;
            }
            delivered
        });

        // Let the producer get some blocks in, then cut it off
        while state.block_count() < 8 {
            thread::yield_now();
        }
        state.halt();
        let _delivered = producer.join().unwrap();

        let counted = state.block_count();
        let session = state.take();
        assert_eq!(session.blocks.len(), counted);
        // Every appended block arrived whole
        assert!(session.blocks.iter().all(|b| b.len() == 512));
    }

    #[test]
    fn push_after_halt_is_dropped() {
        let state = SharedSessionState::new(CaptureConfig::default());
        state.arm();
        state.push_block(vec![0.0; 64], 44100, 1);
        state.halt();

        state.push_block(vec![0.0; 64], 44100, 1);
        state.push_block(vec![0.0; 64], 44100, 1);

        assert_eq!(state.block_count(), 1);
    }

    #[test]
    fn arm_clears_previous_session() {
        let state = SharedSessionState::new(CaptureConfig::default());
        state.arm();
        state.push_block(vec![0.5; 32], 48000, 2);
        state.halt();
        state.arm();

        assert_eq!(state.block_count(), 0);
        assert!(state.is_recording());
    }

    #[test]
    fn error_clears_recording_flag() {
        let state = SharedSessionState::new(CaptureConfig::default());
        state.arm();
        state.set_error("device vanished".to_string());

        assert!(!state.is_recording());
        assert_eq!(state.error().as_deref(), Some("device vanished"));
    }

    #[test]
    fn duration_counts_frames_not_samples() {
        let state = SharedSessionState::new(CaptureConfig {
            sample_rate: 44100,
            channels: 1,
        });
        state.arm();
        state.push_block(vec![0.0; 44100], 44100, 1);
        assert!((state.duration() - 1.0).abs() < 1e-9);

        // Stereo: interleaved samples count double per second
        let stereo = SharedSessionState::new(CaptureConfig {
            sample_rate: 44100,
            channels: 2,
        });
        stereo.arm();
        stereo.push_block(vec![0.0; 88200], 44100, 2);
        assert!((stereo.duration() - 1.0).abs() < 1e-9);
    }
}
