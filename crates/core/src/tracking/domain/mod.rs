pub mod sample_store;
pub mod tracking_sample;
