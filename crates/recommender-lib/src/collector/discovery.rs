//! Instance discovery helpers
//!
//! Turns raw pod listings (name, namespace, phase, labels) into
//! [`DiscoveredInstance`] records: derives the application an instance
//! belongs to, maps lifecycle phases, and attaches GC policy and original
//! requests/limits when they are known.

use crate::models::{DiscoveredInstance, InstanceKey, InstanceStatus, Recommendation, RecommendationField};
use crate::runtime::GcPolicy;
use std::collections::HashMap;
use tracing::debug;

/// Derive the application name from an instance name.
///
/// Deployment pods look like `<app>-<replicaset hash>-<pod hash>`,
/// statefulset pods like `<app>-<ordinal>`, daemonset and job pods like
/// `<app>-<pod hash>`. Names matching none of these are returned unchanged.
pub fn application_name_from_instance(instance: &str) -> String {
    let parts: Vec<&str> = instance.split('-').collect();
    if parts.len() < 2 {
        return instance.to_string();
    }

    let last = parts[parts.len() - 1];
    let strip = if parts.len() >= 3 && is_pod_hash(last) && is_replica_set_hash(parts[parts.len() - 2]) {
        2
    } else if is_pod_hash(last) || is_ordinal(last) {
        1
    } else {
        0
    };

    parts[..parts.len() - strip].join("-")
}

fn is_pod_hash(segment: &str) -> bool {
    segment.len() == 5 && segment.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn is_replica_set_hash(segment: &str) -> bool {
    (6..=10).contains(&segment.len())
        && segment.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && segment.chars().any(|c| c.is_ascii_digit())
}

fn is_ordinal(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

/// Map a pod phase to an instance status
pub fn status_from_phase(phase: &str) -> InstanceStatus {
    match phase {
        "Running" => InstanceStatus::Running,
        "Succeeded" | "Failed" => InstanceStatus::Terminated,
        // Pending, Unknown and anything unexpected
        _ => InstanceStatus::Idle,
    }
}

/// One pod reported by the discovery query
#[derive(Debug, Clone)]
pub struct PodListing {
    pub key: InstanceKey,
    pub phase: String,
}

/// Assembles discovery results from several partial listings
#[derive(Debug, Default)]
pub struct DiscoveryBuilder {
    pods: Vec<PodListing>,
    gc_policies: HashMap<InstanceKey, GcPolicy>,
    originals: HashMap<InstanceKey, Recommendation>,
}

impl DiscoveryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pod; when a pod is listed under several phases the first
    /// listing wins
    pub fn pod(&mut self, key: InstanceKey, phase: impl Into<String>) -> &mut Self {
        if !self.pods.iter().any(|p| p.key == key) {
            self.pods.push(PodListing {
                key,
                phase: phase.into(),
            });
        }
        self
    }

    /// Record the GC policy label of a pod; unparsable names are ignored
    pub fn gc_policy(&mut self, key: InstanceKey, policy: &str) -> &mut Self {
        match policy.parse::<GcPolicy>() {
            Ok(policy) => {
                self.gc_policies.insert(key, policy);
            }
            Err(e) => debug!(instance = %key, error = %e, "Ignoring GC policy label"),
        }
        self
    }

    /// Record a configured request or limit
    pub fn original(&mut self, key: InstanceKey, field: RecommendationField, value: f64) -> &mut Self {
        self.originals.entry(key).or_default().set(field, value);
        self
    }

    pub fn build(self) -> Vec<DiscoveredInstance> {
        let Self {
            pods,
            gc_policies,
            originals,
        } = self;

        pods.into_iter()
            .map(|pod| DiscoveredInstance {
                application: application_name_from_instance(&pod.key.name),
                status: status_from_phase(&pod.phase),
                gc_policy: gc_policies.get(&pod.key).copied(),
                original: originals.get(&pod.key).copied().unwrap_or_default(),
                key: pod.key,
            })
            .collect()
    }
}
