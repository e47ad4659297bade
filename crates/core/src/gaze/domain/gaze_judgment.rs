use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::High => write!(f, "high"),
            ConfidenceLevel::Medium => write!(f, "medium"),
            ConfidenceLevel::Low => write!(f, "low"),
        }
    }
}

/// Headline verdict, in the precedence users see it: a low-confidence
/// detection is reported as such before any not-looking reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeStatus {
    Looking,
    NotLooking,
    LowConfidence,
}

/// Why a judgment was downgraded or disqualified.
///
/// Each variant carries the exact measured value; rounding to two decimals
/// happens only in `Display`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GazeReason {
    LowFaceConfidence(f64),
    HeadTurned(f64),
    HeadTilted(f64),
    EyesHorizontal(f64),
    EyesVertical(f64),
    LowEyeConfidence(f64),
}

impl GazeReason {
    /// Disqualifying reasons mean the user is not looking at the screen.
    /// The two confidence reasons only degrade the judgment's confidence.
    pub fn is_disqualifying(&self) -> bool {
        !matches!(
            self,
            GazeReason::LowFaceConfidence(_) | GazeReason::LowEyeConfidence(_)
        )
    }

    pub fn value(&self) -> f64 {
        match *self {
            GazeReason::LowFaceConfidence(v)
            | GazeReason::HeadTurned(v)
            | GazeReason::HeadTilted(v)
            | GazeReason::EyesHorizontal(v)
            | GazeReason::EyesVertical(v)
            | GazeReason::LowEyeConfidence(v) => v,
        }
    }
}

impl fmt::Display for GazeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GazeReason::LowFaceConfidence(v) => {
                write!(f, "Face detection confidence is low ({v:.2}%)")
            }
            GazeReason::HeadTurned(v) => write!(f, "Head turned too far horizontally ({v:.2}°)"),
            GazeReason::HeadTilted(v) => write!(f, "Head tilted too far vertically ({v:.2}°)"),
            GazeReason::EyesHorizontal(v) => {
                write!(f, "Eyes looking too far left/right ({v:.2}°)")
            }
            GazeReason::EyesVertical(v) => write!(f, "Eyes looking too far up/down ({v:.2}°)"),
            GazeReason::LowEyeConfidence(v) => {
                write!(f, "Eye direction confidence is low ({v:.2}%)")
            }
        }
    }
}

impl Serialize for GazeReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The looking-at-screen decision for a single face.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GazeJudgment {
    is_looking_at_screen: bool,
    confidence_level: ConfidenceLevel,
    reasons: Vec<GazeReason>,
}

impl GazeJudgment {
    pub(crate) fn new() -> Self {
        Self {
            is_looking_at_screen: true,
            confidence_level: ConfidenceLevel::High,
            reasons: Vec::new(),
        }
    }

    /// Records a reason; disqualifying reasons also clear the looking flag.
    pub(crate) fn push(&mut self, reason: GazeReason) {
        if reason.is_disqualifying() {
            self.is_looking_at_screen = false;
        }
        self.reasons.push(reason);
    }

    pub(crate) fn set_confidence_level(&mut self, level: ConfidenceLevel) {
        self.confidence_level = level;
    }

    pub fn is_looking_at_screen(&self) -> bool {
        self.is_looking_at_screen
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence_level
    }

    pub fn status(&self) -> GazeStatus {
        if self.confidence_level == ConfidenceLevel::Low {
            GazeStatus::LowConfidence
        } else if !self.is_looking_at_screen {
            GazeStatus::NotLooking
        } else {
            GazeStatus::Looking
        }
    }

    /// Reasons in evaluation order: face confidence, head pose, eye direction.
    pub fn reasons(&self) -> &[GazeReason] {
        &self.reasons
    }

    /// Reasons rendered as the human-readable strings shown to users.
    pub fn reason_messages(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }

    /// Low confidence shows only the first reason; not looking shows all of
    /// them.
    pub fn status_line(&self) -> String {
        match self.status() {
            GazeStatus::LowConfidence => {
                let first = self
                    .reasons
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "Low confidence".to_string());
                format!("Warning: {first}")
            }
            GazeStatus::NotLooking => {
                format!("Not looking at screen: {}", self.reason_messages().join(". "))
            }
            GazeStatus::Looking => "Looking at screen".to_string(),
        }
    }
}
