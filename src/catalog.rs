//! Catalog of recordings on disk
//!
//! A read of the recordings directory; the view layer renders the rows.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::models::RecordingInfo;
use crate::recorder::RECORDING_EXT;

/// List all recordings in `dir`, newest first.
///
/// Only files carrying the container extension (case-insensitive) are
/// returned. A missing directory lists as empty. The order is for
/// display; callers must not depend on it for correctness.
pub fn list(dir: &Path) -> std::io::Result<Vec<RecordingInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut recordings: Vec<RecordingInfo> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase() == RECORDING_EXT)
                .unwrap_or(false)
        })
        .filter_map(|entry| describe(&entry))
        .collect();

    // Sort by modification time, newest first
    recordings.sort_by(|a, b| b.modified.cmp(&a.modified));

    Ok(recordings)
}

fn describe(entry: &std::fs::DirEntry) -> Option<RecordingInfo> {
    let metadata = entry.metadata().ok()?;
    if !metadata.is_file() {
        return None;
    }

    let modified: DateTime<Utc> = metadata.modified().ok()?.into();

    Some(RecordingInfo {
        file_name: entry.file_name().to_string_lossy().into_owned(),
        modified,
        duration_seconds: probe_duration(&entry.path()),
        size_bytes: metadata.len(),
    })
}

/// Read the duration from the WAV header, if it parses
fn probe_duration(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;

    #[test]
    fn only_container_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"), &[0i16; 4410], 44100, 1).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not audio").unwrap();
        std::fs::write(dir.path().join("no_extension"), b"").unwrap();

        let rows = list(dir.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_name, "a.wav");
        assert!((rows[0].duration_seconds.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SHOUTY.WAV"), b"not a real header").unwrap();

        let rows = list(dir.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_name, "SHOUTY.WAV");
        // Unparsable header: no duration, but the file still lists
        assert!(rows[0].duration_seconds.is_none());
    }

    #[test]
    fn missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows = list(&dir.path().join("never-created")).unwrap();
        assert!(rows.is_empty());
    }
}
