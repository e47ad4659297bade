pub mod gaze_detector;
