pub mod capture;
pub mod detection;
pub mod gaze;
pub mod pipeline;
pub mod shared;
pub mod tracking;
