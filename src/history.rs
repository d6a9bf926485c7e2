//! Bounded sample history for trend display
//!
//! Oldest-first, FIFO eviction once `capacity` is reached. Only the gauge
//! actor writes to it; readers receive an immutable snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::sample::Sample;

/// Default number of samples retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Fixed-capacity sample buffer
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Capacity of zero is bumped to one so the buffer always holds the latest sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full. Returns the evicted sample.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        self.samples.push_back(sample);

        if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        }
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

    /// Immutable copy, oldest first
    pub fn snapshot(&self) -> Arc<[Sample]> {
        self.samples.iter().cloned().collect()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
