use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::capture::domain::frame_source::FrameSource;
use crate::detection::domain::gaze_detector::{DetectError, GazeDetector};
use crate::gaze::domain::face_measurement::RawFaceMeasurement;
use crate::gaze::domain::gaze_interpreter::interpret;
use crate::gaze::domain::gaze_judgment::GazeJudgment;
use crate::tracking::domain::tracking_sample::TrackingSample;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("face analysis failed: {0}")]
    Detection(#[from] DetectError),
}

/// The interpreted first face of one analyzed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct GazeReport {
    pub timestamp: DateTime<Utc>,
    pub faces_detected: usize,
    pub face: RawFaceMeasurement,
    pub judgment: GazeJudgment,
}

impl GazeReport {
    pub fn to_sample(&self) -> TrackingSample {
        TrackingSample::from_judgment(&self.face, &self.judgment, self.timestamp)
    }
}

/// Result of a cycle that ran to completion without a detector failure.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Judged(GazeReport),
    /// The detector saw no face. Not an error, and nothing is recorded.
    NoFace,
    /// The frame source was not ready; the cycle was skipped.
    CaptureUnavailable,
}

/// One analysis pass: capture → detect → interpret.
///
/// Shared by overlapping sampling cycles, so the frame source sits behind a
/// mutex while the detector call runs unlocked.
pub struct AnalyzeFrameUseCase {
    frame_source: Mutex<Box<dyn FrameSource>>,
    detector: Box<dyn GazeDetector>,
}

impl AnalyzeFrameUseCase {
    pub fn new(frame_source: Box<dyn FrameSource>, detector: Box<dyn GazeDetector>) -> Self {
        Self {
            frame_source: Mutex::new(frame_source),
            detector,
        }
    }

    pub fn execute(&self, eye_confidence_threshold: f64) -> Result<CycleOutcome, CycleError> {
        let frame = {
            let mut source = self
                .frame_source
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            source.capture_frame()
        };
        let Some(frame) = frame else {
            return Ok(CycleOutcome::CaptureUnavailable);
        };

        let detection = self.detector.detect(&frame)?;
        let Some(face) = detection.primary_face() else {
            return Ok(CycleOutcome::NoFace);
        };

        let judgment = interpret(face, eye_confidence_threshold);
        Ok(CycleOutcome::Judged(GazeReport {
            timestamp: Utc::now(),
            faces_detected: detection.faces_detected,
            face: face.clone(),
            judgment,
        }))
    }
}
