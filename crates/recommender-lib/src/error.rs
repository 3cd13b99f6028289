//! Error types for the recommendation engine

use thiserror::Error;

use crate::models::InstanceKey;
use crate::runtime::GcPolicy;

/// Errors surfaced by the engine.
///
/// Insufficient data is never an error; it shows up as `None` fields.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Aggregation or query for an application that was never discovered.
    #[error("No such application: {0}")]
    UnknownApplication(String),

    /// Sample or heap data for an instance that was never discovered.
    #[error("No such instance: {0}")]
    UnknownInstance(InstanceKey),

    /// Region name outside the set owned by the GC policy.
    #[error("Invalid region '{region}' for GC policy {policy}")]
    InvalidRegion { policy: GcPolicy, region: String },

    /// Region size that is negative or not a finite number.
    #[error("Invalid size {bytes} for region '{region}'")]
    InvalidRegionSize { region: String, bytes: f64 },

    #[error("Unknown GC policy: {0}")]
    UnknownGcPolicy(String),

    /// Heap sample taken under a different GC policy than the instance was
    /// discovered with.
    #[error("Heap sample for {instance} uses {actual}, instance runs {expected}")]
    PolicyMismatch {
        instance: InstanceKey,
        expected: GcPolicy,
        actual: GcPolicy,
    },

    /// Non-finite values in a sample.
    #[error("Invalid sample for {0}: non-finite value")]
    InvalidSample(InstanceKey),

    /// Historical value recovered from the metrics store could not be used.
    #[error("Malformed history for {application}: {reason}")]
    MalformedHistory { application: String, reason: String },

    /// Metrics store request failed.
    #[error("Metrics transport failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
