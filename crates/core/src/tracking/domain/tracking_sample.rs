use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gaze::domain::face_measurement::{EyeDirection, HeadPose, RawFaceMeasurement};
use crate::gaze::domain::gaze_judgment::GazeJudgment;

/// One judged capture, as kept for export.
///
/// Serializes to the session-data format: `timestamp`, `headPose`,
/// `eyeDirection` and `isLookingAtScreen`, with `null` for absent values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSample {
    pub timestamp: DateTime<Utc>,
    pub head_pose: Option<HeadPose>,
    pub eye_direction: Option<EyeDirection>,
    pub is_looking_at_screen: Option<bool>,
}

impl TrackingSample {
    pub fn from_judgment(
        face: &RawFaceMeasurement,
        judgment: &GazeJudgment,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            head_pose: face.head_pose,
            eye_direction: face.eye_direction,
            is_looking_at_screen: Some(judgment.is_looking_at_screen()),
        }
    }
}
