use serde::{Deserialize, Serialize};

/// Face bounding box as fractions (0-1) of the frame dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Head orientation in degrees. Conventionally within [-180, 180] but
/// not clamped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Eye gaze direction in degrees, with the provider's confidence (0-100)
/// in the reading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EyeDirection {
    pub yaw: f64,
    pub pitch: f64,
    pub confidence: f64,
}

/// One face as reported by the detector, before any interpretation.
///
/// `head_pose` and `eye_direction` are optional: providers omit them when
/// the face is too small or occluded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFaceMeasurement {
    pub confidence: f64,
    pub bounding_box: Option<BoundingBox>,
    pub head_pose: Option<HeadPose>,
    pub eye_direction: Option<EyeDirection>,
}

impl RawFaceMeasurement {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            bounding_box: None,
            head_pose: None,
            eye_direction: None,
        }
    }

    pub fn with_head_pose(mut self, yaw: f64, pitch: f64, roll: f64) -> Self {
        self.head_pose = Some(HeadPose { yaw, pitch, roll });
        self
    }

    pub fn with_eye_direction(mut self, yaw: f64, pitch: f64, confidence: f64) -> Self {
        self.eye_direction = Some(EyeDirection {
            yaw,
            pitch,
            confidence,
        });
        self
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}
