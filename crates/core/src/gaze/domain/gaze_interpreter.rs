use crate::gaze::domain::face_measurement::{EyeDirection, HeadPose, RawFaceMeasurement};
use crate::gaze::domain::gaze_judgment::{ConfidenceLevel, GazeJudgment, GazeReason};
use crate::shared::constants::{
    EYE_PITCH_THRESHOLD, EYE_YAW_THRESHOLD, FACE_CONFIDENCE_THRESHOLD, HEAD_PITCH_THRESHOLD,
    HEAD_YAW_THRESHOLD,
};

/// Decides whether a detected face is looking at the screen.
///
/// Checks run in a fixed order and accumulate: face confidence, then head
/// pose, then eye direction. A missing head pose or eye direction skips its
/// check. `eye_confidence_threshold` is the minimum eye-direction confidence
/// (percent) at which eye angles are trusted.
pub fn interpret(face: &RawFaceMeasurement, eye_confidence_threshold: f64) -> GazeJudgment {
    let mut judgment = GazeJudgment::new();

    if face.confidence < FACE_CONFIDENCE_THRESHOLD {
        judgment.set_confidence_level(ConfidenceLevel::Low);
        judgment.push(GazeReason::LowFaceConfidence(face.confidence));
    }

    if let Some(pose) = &face.head_pose {
        check_head_pose(pose, &mut judgment);
    }

    if let Some(eyes) = &face.eye_direction {
        check_eye_direction(eyes, eye_confidence_threshold, &mut judgment);
    }

    judgment
}

fn check_head_pose(pose: &HeadPose, judgment: &mut GazeJudgment) {
    if pose.yaw.abs() > HEAD_YAW_THRESHOLD {
        judgment.push(GazeReason::HeadTurned(pose.yaw));
    }
    if pose.pitch.abs() > HEAD_PITCH_THRESHOLD {
        judgment.push(GazeReason::HeadTilted(pose.pitch));
    }
}

fn check_eye_direction(eyes: &EyeDirection, threshold: f64, judgment: &mut GazeJudgment) {
    if eyes.confidence >= threshold {
        if eyes.yaw.abs() > EYE_YAW_THRESHOLD {
            judgment.push(GazeReason::EyesHorizontal(eyes.yaw));
        }
        if eyes.pitch.abs() > EYE_PITCH_THRESHOLD {
            judgment.push(GazeReason::EyesVertical(eyes.pitch));
        }
    } else {
        // Overwrites a prior Low from the face check.
        judgment.set_confidence_level(ConfidenceLevel::Medium);
        judgment.push(GazeReason::LowEyeConfidence(eyes.confidence));
    }
}
