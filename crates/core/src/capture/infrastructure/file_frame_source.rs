use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::encoded_image::EncodedImage;

/// Reads the latest snapshot that an external capture tool keeps
/// overwriting at a fixed path.
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FileFrameSource {
    fn capture_frame(&mut self) -> Option<EncodedImage> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("Snapshot {} not written yet", self.path.display());
                return None;
            }
            Err(e) => {
                log::warn!("Failed to read snapshot {}: {e}", self.path.display());
                return None;
            }
        };

        match EncodedImage::from_bytes(bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                // Usually a partially written file; the next cycle retries.
                log::warn!("Snapshot {} unusable: {e}", self.path.display());
                None
            }
        }
    }
}
