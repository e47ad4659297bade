pub mod http_gaze_detector;
