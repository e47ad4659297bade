pub mod face_measurement;
pub mod gaze_interpreter;
pub mod gaze_judgment;
