use thiserror::Error;

use crate::gaze::domain::face_measurement::RawFaceMeasurement;
use crate::shared::encoded_image::EncodedImage;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("analysis service returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("invalid response from analysis service: {0}")]
    InvalidResponse(String),
    #[error("image too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },
    #[error("invalid analysis endpoint {0}")]
    InvalidEndpoint(String),
}

/// Faces found in one frame, in provider order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detection {
    pub faces_detected: usize,
    pub faces: Vec<RawFaceMeasurement>,
}

impl Detection {
    pub fn new(faces: Vec<RawFaceMeasurement>) -> Self {
        Self {
            faces_detected: faces.len(),
            faces,
        }
    }

    /// Only the first face is ever interpreted.
    pub fn primary_face(&self) -> Option<&RawFaceMeasurement> {
        if self.faces_detected == 0 {
            return None;
        }
        self.faces.first()
    }
}

/// Domain interface for the remote face-analysis provider.
///
/// Takes `&self` so overlapping sampling cycles can share one detector.
pub trait GazeDetector: Send + Sync {
    fn detect(&self, image: &EncodedImage) -> Result<Detection, DetectError>;
}
