pub mod analyze_frame_use_case;
pub mod infrastructure;
pub mod sampling_controller;
pub mod tracking_listener;
