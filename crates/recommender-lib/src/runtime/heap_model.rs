//! Heap/non-heap decomposition of one JVM sample

use super::gc_policy::{GcPolicy, NON_HEAP_REGIONS};
use crate::error::{EngineError, Result};
use std::collections::BTreeMap;

/// Region sizes in bytes, restricted to the regions the GC policy owns.
///
/// Every valid region starts at zero; setting or reading any other name
/// fails without touching the model.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapModel {
    policy: GcPolicy,
    heap: BTreeMap<&'static str, f64>,
    non_heap: BTreeMap<&'static str, f64>,
}

impl HeapModel {
    pub fn new(policy: GcPolicy) -> Self {
        Self {
            policy,
            heap: policy.heap_regions().iter().map(|r| (*r, 0.0)).collect(),
            non_heap: NON_HEAP_REGIONS.iter().map(|r| (*r, 0.0)).collect(),
        }
    }

    pub fn policy(&self) -> GcPolicy {
        self.policy
    }

    pub fn set_heap(&mut self, region: &str, bytes: f64) -> Result<()> {
        let slot = self
            .heap
            .get_mut(region)
            .ok_or_else(|| invalid_region(self.policy, region))?;
        *slot = checked_size(region, bytes)?;
        Ok(())
    }

    pub fn heap(&self, region: &str) -> Result<f64> {
        self.heap
            .get(region)
            .copied()
            .ok_or_else(|| invalid_region(self.policy, region))
    }

    pub fn set_non_heap(&mut self, region: &str, bytes: f64) -> Result<()> {
        let slot = self
            .non_heap
            .get_mut(region)
            .ok_or_else(|| invalid_region(self.policy, region))?;
        *slot = checked_size(region, bytes)?;
        Ok(())
    }

    pub fn non_heap(&self, region: &str) -> Result<f64> {
        self.non_heap
            .get(region)
            .copied()
            .ok_or_else(|| invalid_region(self.policy, region))
    }

    /// Sum of all heap regions, in bytes
    pub fn total_heap_size(&self) -> f64 {
        self.heap.values().sum()
    }

    /// Sum of all non-heap regions, in bytes
    pub fn total_non_heap_size(&self) -> f64 {
        self.non_heap.values().sum()
    }
}

fn checked_size(region: &str, bytes: f64) -> Result<f64> {
    if bytes.is_finite() && bytes >= 0.0 {
        Ok(bytes)
    } else {
        Err(EngineError::InvalidRegionSize {
            region: region.to_string(),
            bytes,
        })
    }
}

fn invalid_region(policy: GcPolicy, region: &str) -> EngineError {
    EngineError::InvalidRegion {
        policy,
        region: region.to_string(),
    }
}
