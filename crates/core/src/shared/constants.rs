/// Faces detected below this confidence (percent) degrade the judgment to low.
pub const FACE_CONFIDENCE_THRESHOLD: f64 = 90.0;

/// Head yaw beyond ±25° counts as turned away from the screen.
pub const HEAD_YAW_THRESHOLD: f64 = 25.0;
/// Head pitch beyond ±20° counts as tilted away from the screen.
pub const HEAD_PITCH_THRESHOLD: f64 = 20.0;

pub const EYE_YAW_THRESHOLD: f64 = 15.0;
pub const EYE_PITCH_THRESHOLD: f64 = 15.0;

/// Eye-direction readings below this confidence (percent) are not trusted.
pub const DEFAULT_EYE_CONFIDENCE_THRESHOLD: f64 = 70.0;

pub const SAMPLE_STORE_CAPACITY: usize = 1000;

pub const DEFAULT_INTERVAL_MS: u64 = 3000;
pub const MIN_INTERVAL_MS: u64 = 1000;
pub const MAX_INTERVAL_MS: u64 = 10000;

/// Largest frame the analysis service accepts (5 MB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_ANALYZE_ENDPOINT: &str = "http://localhost:3000/api/analyze";

pub const SESSION_FILE_PREFIX: &str = "tracking-data-";
