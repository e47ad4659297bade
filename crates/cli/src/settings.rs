use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use gazewatch_core::shared::constants::{
    DEFAULT_ANALYZE_ENDPOINT, DEFAULT_EYE_CONFIDENCE_THRESHOLD, DEFAULT_INTERVAL_MS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub endpoint: String,
    pub interval_ms: u64,
    pub confidence_threshold: u32,
    #[serde(default = "default_record_samples")]
    pub record_samples: bool,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub frame_file: Option<PathBuf>,
    #[serde(default)]
    pub capture_command: Option<String>,
}

fn default_record_samples() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ANALYZE_ENDPOINT.to_string(),
            interval_ms: DEFAULT_INTERVAL_MS,
            confidence_threshold: DEFAULT_EYE_CONFIDENCE_THRESHOLD as u32,
            record_samples: default_record_samples(),
            data_dir: None,
            frame_file: None,
            capture_command: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("GazeWatch").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed settings {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.endpoint, "http://localhost:3000/api/analyze");
        assert_eq!(settings.interval_ms, 3000);
        assert_eq!(settings.confidence_threshold, 70);
        assert!(settings.record_samples);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GazeWatch").join("settings.json");
        let settings = Settings {
            interval_ms: 5000,
            capture_command: Some("fswebcam -".to_string()),
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Settings::load_from(&dir.path().join("nope.json")),
            Settings::default()
        );
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_optional_fields_default_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"endpoint": "http://cam.local/api/analyze", "interval_ms": 2000, "confidence_threshold": 80}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path);

        assert_eq!(settings.endpoint, "http://cam.local/api/analyze");
        assert!(settings.record_samples);
        assert!(settings.frame_file.is_none());
    }
}
