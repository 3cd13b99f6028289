//! Per-instance state held by the engine

use crate::models::{
    DiscoveredInstance, InstanceKey, InstanceStatus, InstanceView, Recommendation,
};
use crate::runtime::{GcPolicy, HeapModel};
use crate::store::SampleStore;
use crate::watermark;

/// Runtime samples of an instance exposing JVM metrics
#[derive(Debug, Clone)]
pub(crate) struct RuntimeState {
    pub policy: GcPolicy,
    pub samples: Vec<HeapModel>,
}

#[derive(Debug, Clone)]
pub(crate) struct InstanceState {
    pub key: InstanceKey,
    pub application: String,
    pub status: InstanceStatus,
    pub store: SampleStore,
    /// Values configured on the deployment; set once
    pub original: Recommendation,
    /// Most recent unmerged recommendation
    pub current: Recommendation,
    pub watermark: Recommendation,
    pub runtime: Option<RuntimeState>,
}

impl InstanceState {
    pub fn from_discovery(discovered: &DiscoveredInstance, seed: Option<&Recommendation>) -> Self {
        Self {
            key: discovered.key.clone(),
            application: discovered.application.clone(),
            status: discovered.status,
            store: SampleStore::new(),
            original: discovered.original,
            current: Recommendation::UNKNOWN,
            watermark: seed.copied().unwrap_or(Recommendation::UNKNOWN),
            runtime: discovered.gc_policy.map(|policy| RuntimeState {
                policy,
                samples: Vec::new(),
            }),
        }
    }

    /// Store a freshly computed recommendation and fold it into the watermark
    pub fn apply(&mut self, fresh: Recommendation) -> Recommendation {
        self.current = fresh;
        self.watermark = watermark::merge(&self.watermark, &fresh);
        if self.store.is_empty() && self.status == InstanceStatus::Running {
            self.status = InstanceStatus::Idle;
        }
        self.watermark
    }

    pub fn view(&self) -> InstanceView {
        InstanceView {
            key: self.key.clone(),
            application: self.application.clone(),
            status: self.status,
            sample_count: self.store.len(),
            original: self.original,
            current: self.current,
            watermark: self.watermark,
        }
    }
}
