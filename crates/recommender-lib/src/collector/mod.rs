//! Metrics collection from the cluster metrics store
//!
//! The engine never talks to the outside world directly. Discovery,
//! utilization samples, runtime heap samples and recovery of previously
//! published values come in through the [`MetricsSource`] and
//! [`HistorySource`] traits; [`PrometheusSource`] implements both against
//! the Prometheus HTTP API.

mod discovery;
mod r#loop;
mod prometheus;

pub use discovery::{
    application_name_from_instance, status_from_phase, DiscoveryBuilder, PodListing,
};
pub use prometheus::{PrometheusSource, QueryTemplates};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder, CycleStats};

use crate::models::{DiscoveredInstance, InstanceKey, Recommendation, Sample};
use crate::runtime::{GcPolicy, HeapModel};
use anyhow::Result;

pub use async_trait::async_trait;

/// Source of instance listings and per-instance measurements
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// List every instance currently known to the platform
    async fn discover(&self) -> Result<Vec<DiscoveredInstance>>;

    /// Current utilization of an instance; `None` when the store has no data
    async fn sample(&self, instance: &InstanceKey) -> Result<Option<Sample>>;

    /// Current heap decomposition of a JVM instance; `None` when the store
    /// has no data
    async fn heap_sample(&self, instance: &InstanceKey, policy: GcPolicy)
        -> Result<Option<HeapModel>>;
}

/// Source of values published before a restart
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Last published four fields for an application; fields the store has
    /// never seen are `None`
    async fn last_published(&self, application: &str) -> Result<Recommendation>;
}
