//! Resource recommendation library
//!
//! This crate provides:
//! - Per-instance sample storage and the request/limit algorithm
//! - High-water-mark merging and per-application aggregation
//! - JVM heap sizing per GC policy
//! - Collection from Prometheus and the HTTP API
//! - Health checks and observability

pub mod aggregator;
pub mod analysis;
pub mod api;
pub mod collector;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod runtime;
pub mod store;
pub mod watermark;

pub use analysis::{Platform, RecommendationAlgorithm, RecommendationPolicy};
pub use engine::{CycleReport, DiscoverySummary, Engine};
pub use error::{EngineError, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use store::{SampleSnapshot, SampleStore};
