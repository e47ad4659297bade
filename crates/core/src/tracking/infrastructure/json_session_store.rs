use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::shared::constants::SESSION_FILE_PREFIX;
use crate::tracking::domain::tracking_sample::TrackingSample;

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid session id '{0}'")]
    InvalidSessionId(String),
    #[error("no tracking data found for session {0}")]
    NotFound(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed tracking data in {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not determine data directory")]
    NoDataDir,
}

/// Persists exported sessions as `tracking-data-<id>.json` files.
pub struct JsonSessionStore {
    data_dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Store rooted at the platform data directory.
    ///
    /// - macOS: `~/Library/Application Support/GazeWatch/sessions/`
    /// - Linux: `$XDG_DATA_HOME/GazeWatch/sessions/` or `~/.local/share/GazeWatch/sessions/`
    /// - Windows: `%APPDATA%/GazeWatch/sessions/`
    pub fn in_default_location() -> Result<Self, SessionStoreError> {
        default_data_dir().map(Self::new)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Writes the samples as a pretty JSON array and returns the file path.
    ///
    /// Without a session id the current time is used.
    pub fn save(
        &self,
        session_id: Option<&str>,
        samples: &[TrackingSample],
    ) -> Result<PathBuf, SessionStoreError> {
        let id = match session_id {
            Some(id) => id.to_string(),
            None => timestamp_session_id(Utc::now()),
        };
        let path = self.session_path(&id)?;

        fs::create_dir_all(&self.data_dir).map_err(|e| SessionStoreError::DataDir {
            path: self.data_dir.clone(),
            source: e,
        })?;

        let json = serde_json::to_string_pretty(samples).map_err(|e| SessionStoreError::Format {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, json).map_err(|e| SessionStoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        log::info!("Saved {} samples to {}", samples.len(), path.display());
        Ok(path)
    }

    pub fn load(&self, session_id: &str) -> Result<Vec<TrackingSample>, SessionStoreError> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Err(SessionStoreError::NotFound(session_id.to_string()));
        }

        let json = fs::read_to_string(&path).map_err(|e| SessionStoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SessionStoreError::Format { path, source: e })
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf, SessionStoreError> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionStoreError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self
            .data_dir
            .join(format!("{SESSION_FILE_PREFIX}{session_id}.json")))
    }
}

/// Filesystem-safe id derived from an ISO timestamp, e.g.
/// `2025-03-01T10-15-30-123Z`.
pub fn timestamp_session_id(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

fn default_data_dir() -> Result<PathBuf, SessionStoreError> {
    dirs::data_dir()
        .map(|d| d.join("GazeWatch").join("sessions"))
        .ok_or(SessionStoreError::NoDataDir)
}
