//! Append-only per-instance sample storage
//!
//! Samples live behind an `Arc`. Appending goes through `Arc::make_mut`, so
//! a snapshot handed to a reader keeps the sequence it was taken from while
//! the writer continues on its own copy.

use crate::models::{Dimension, Sample};
use std::ops::Deref;
use std::sync::Arc;

/// Ordered samples of one instance
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    samples: Arc<Vec<Sample>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample
    pub fn append(&mut self, sample: Sample) {
        Arc::make_mut(&mut self.samples).push(sample);
    }

    /// Append all samples of a cycle at once
    pub fn append_batch(&mut self, samples: impl IntoIterator<Item = Sample>) {
        Arc::make_mut(&mut self.samples).extend(samples);
    }

    /// Immutable view of every sample appended so far
    pub fn snapshot(&self) -> SampleSnapshot {
        SampleSnapshot(Arc::clone(&self.samples))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Read-consistent snapshot of a [`SampleStore`]
#[derive(Debug, Clone)]
pub struct SampleSnapshot(Arc<Vec<Sample>>);

impl SampleSnapshot {
    /// Values of one dimension in sequence order
    pub fn values(&self, dimension: Dimension) -> Vec<f64> {
        self.0.iter().map(|s| s.value(dimension)).collect()
    }
}

impl Deref for SampleSnapshot {
    type Target = [Sample];

    fn deref(&self) -> &[Sample] {
        &self.0
    }
}
