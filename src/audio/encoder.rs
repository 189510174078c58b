//! WAV encoding using hound
//!
//! Quantizes captured float blocks to 16-bit PCM and writes them to disk.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs;
use std::path::{Path, PathBuf};

use super::{AudioError, Result};

/// Bit depth of the on-disk container
pub const BITS_PER_SAMPLE: u16 = 16;

/// Concatenate capture blocks in arrival order and quantize to 16-bit PCM.
///
/// Samples are clamped to [-1.0, 1.0] before scaling, so out-of-range
/// values clip at the integer bounds instead of wrapping.
pub fn encode_blocks(blocks: &[Vec<f32>]) -> Vec<i16> {
    let total: usize = blocks.iter().map(Vec::len).sum();
    let mut pcm = Vec::with_capacity(total);
    for block in blocks {
        for &sample in block {
            pcm.push((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
        }
    }
    pcm
}

/// Write 16-bit PCM samples to a WAV file.
///
/// The container is written to a temporary sibling and renamed into
/// place, so a failed write never leaves a readable half-file at `path`.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let tmp_path = temp_sibling(path);
    let result = write_samples(&tmp_path, spec, samples);

    if let Err(e) = result {
        // Leave nothing behind at either path
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        AudioError::Io(e)
    })
}

fn write_samples(path: &Path, spec: WavSpec, samples: &[i16]) -> Result<()> {
    let mut writer = WavWriter::create(path, spec).map_err(write_error)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn write_error(err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(e) => AudioError::Io(e),
        other => AudioError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::load_wav;

    #[test]
    fn out_of_range_samples_clip_instead_of_wrapping() {
        let pcm = encode_blocks(&[vec![1.5, -1.5, 1.0, -1.0, 0.0]]);
        assert_eq!(pcm, vec![i16::MAX, -i16::MAX, i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn blocks_concatenate_in_arrival_order() {
        let pcm = encode_blocks(&[vec![0.0, 0.5], vec![-0.5], vec![1.0]]);
        assert_eq!(pcm.len(), 4);
        assert_eq!(pcm[0], 0);
        assert_eq!(pcm[3], i16::MAX);
        // 0.5 lands in the upper half, -0.5 in the lower
        assert!(pcm[1] > 16000 && pcm[1] < 17000);
        assert!(pcm[2] < -16000 && pcm[2] > -17000);
    }

    #[test]
    fn three_mono_blocks_produce_expected_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take1.wav");

        let blocks = vec![vec![0.1f32; 4410], vec![0.2f32; 4410], vec![0.3f32; 4410]];
        let pcm = encode_blocks(&blocks);
        write_wav(&path, &pcm, 44100, 1).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.duration(), 13230); // frames
        assert_eq!(reader.len(), 13230); // samples

        // 44-byte RIFF header + 2 bytes per sample
        let file_len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(file_len, 44 + 26460);
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.wav");

        let blocks = vec![
            vec![0.0, 0.25, -0.25, 0.9999, -0.9999],
            vec![1.0, -1.0, 0.333, -0.333],
        ];
        let pcm = encode_blocks(&blocks);
        write_wav(&path, &pcm, 44100, 1).unwrap();

        let loaded = load_wav(&path).unwrap();
        assert_eq!(loaded.samples, pcm);
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.channels, 1);
    }

    #[test]
    fn successful_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.wav");

        write_wav(&path, &[0i16; 100], 44100, 1).unwrap();

        assert!(path.exists());
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn failed_write_leaves_no_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-parent").join("take.wav");

        let err = write_wav(&path, &[0i16; 10], 44100, 1).unwrap_err();
        assert!(matches!(err, AudioError::Io(_)));
        assert!(!path.exists());
    }
}
