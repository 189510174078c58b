//! WAV decoding using hound
//!
//! Loads a recording back into memory, validating the container first.

use hound::{SampleFormat, WavReader};
use std::io::ErrorKind;
use std::path::Path;

use super::{encoder::BITS_PER_SAMPLE, AudioError, Result};

/// A decoded recording, ready for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackBuffer {
    /// Interleaved 16-bit PCM samples in capture order
    pub samples: Vec<i16>,
    /// Sample rate the recording was encoded with
    pub sample_rate: u32,
    /// Channel count the recording was encoded with
    pub channels: u16,
}

impl PlaybackBuffer {
    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Convert to float samples for the output stream
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect()
    }
}

/// Load a WAV recording into memory.
///
/// Fails with `NotFound` when `path` does not exist and `CorruptFile`
/// when the header is malformed, the format is not 16-bit integer PCM,
/// or the payload is shorter than the header claims.
pub fn load_wav(path: &Path) -> Result<PlaybackBuffer> {
    if !path.exists() {
        return Err(AudioError::NotFound(path.to_path_buf()));
    }

    let mut reader = WavReader::open(path).map_err(read_error)?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE {
        return Err(AudioError::CorruptFile(format!(
            "expected {}-bit integer PCM, found {}-bit {:?}",
            BITS_PER_SAMPLE, spec.bits_per_sample, spec.sample_format
        )));
    }

    let claimed = reader.len() as usize;
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<i16>, _>>()
        .map_err(read_error)?;

    if samples.len() != claimed {
        return Err(AudioError::CorruptFile(format!(
            "header claims {} samples, payload holds {}",
            claimed,
            samples.len()
        )));
    }

    log::debug!(
        "loaded {} ({} samples, {} Hz, {} ch)",
        path.display(),
        samples.len(),
        spec.sample_rate,
        spec.channels
    );

    Ok(PlaybackBuffer {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn read_error(err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(e) if e.kind() == ErrorKind::UnexpectedEof => {
            AudioError::CorruptFile("payload shorter than the header claims".to_string())
        }
        hound::Error::IoError(e) => AudioError::Io(e),
        other => AudioError::CorruptFile(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;
    use std::fs::OpenOptions;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_wav(&dir.path().join("nope.wav")).unwrap_err();
        assert!(matches!(err, AudioError::NotFound(_)));
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");

        // Header will claim 1000 samples; keep only 500 samples of payload
        write_wav(&path, &[100i16; 1000], 44100, 1).unwrap();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(44 + 500 * 2).unwrap();

        let err = load_wav(&path).unwrap_err();
        assert!(matches!(err, AudioError::CorruptFile(_)));
    }

    #[test]
    fn garbage_header_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a RIFF container").unwrap();

        let err = load_wav(&path).unwrap_err();
        assert!(matches!(err, AudioError::CorruptFile(_)));
    }

    #[test]
    fn wrong_bit_depth_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        let err = load_wav(&path).unwrap_err();
        assert!(matches!(err, AudioError::CorruptFile(_)));
    }

    #[test]
    fn buffer_reports_frames_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, &[0i16; 88200], 44100, 2).unwrap();

        let buffer = load_wav(&path).unwrap();
        assert_eq!(buffer.frame_count(), 44100);
        assert!((buffer.duration_seconds() - 1.0).abs() < 1e-9);
    }
}
