//! Application settings persistence
//!
//! Settings are stored as JSON at ~/.config/patter/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory recordings are saved into and listed from
    pub recordings_dir: PathBuf,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Capture channel count
    pub channels: u16,
}

impl Default for Settings {
    fn default() -> Self {
        let recordings_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("patter")
            .join("recordings");
        Self {
            recordings_dir,
            sample_rate: 44100,
            channels: 1,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("patter")
            .join("settings.json")
    }

    /// Load settings from the default location.
    ///
    /// A missing or unreadable file falls back to defaults; settings
    /// problems never abort the program.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_capture_contract() {
        let settings = Settings::default();
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.channels, 1);
        assert!(settings.recordings_dir.ends_with("patter/recordings"));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.sample_rate = 48000;
        settings.channels = 2;
        settings.recordings_dir = dir.path().join("takes");
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.sample_rate, 48000);
        assert_eq!(loaded.channels, 2);
        assert_eq!(loaded.recordings_dir, dir.path().join("takes"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("absent.json"));
        assert_eq!(loaded.sample_rate, 44100);
    }

    #[test]
    fn unparsable_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{ this is not json").unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.channels, 1);
    }
}
