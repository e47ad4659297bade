use std::collections::VecDeque;

use crate::shared::constants::SAMPLE_STORE_CAPACITY;
use crate::tracking::domain::tracking_sample::TrackingSample;

/// Bounded, append-only history of tracking samples.
///
/// Once full, each append evicts the oldest sample, so the store always
/// holds the most recent `capacity` samples in append order.
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: VecDeque<TrackingSample>,
    capacity: usize,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::with_capacity(SAMPLE_STORE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, sample: TrackingSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Snapshot of all samples, oldest first. The store is left intact.
    pub fn export_all(&self) -> Vec<TrackingSample> {
        self.samples.iter().cloned().collect()
    }

    /// Snapshot rendered as the session-data JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.samples)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}
