pub mod command_frame_source;
pub mod file_frame_source;
