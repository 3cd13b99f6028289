//! Statistical analysis of utilization samples
//!
//! This module provides:
//! - Percentile/mode/quantization primitives
//! - The per-platform recommendation policy
//! - The request/limit algorithm for a single instance

mod algorithm;
mod policy;
pub mod stats;

pub use algorithm::RecommendationAlgorithm;
pub use policy::{
    Platform, RecommendationPolicy, DEFAULT_IDLE_CPU_THRESHOLD, DEFAULT_SPIKE_FLOOR_MIB,
    HEAP_CAP_RATIO, MEMORY_ROUNDING_STEP, REQUEST_PERCENTILE,
};
