//! Core data models for the recommendation engine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::runtime::GcPolicy;

/// One utilization observation taken at a polling tick.
///
/// CPU is expressed in cores, RSS in MiB. Network is carried along for
/// completeness but no recommendation is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub rss: f64,
    pub cpu: f64,
    pub network: f64,
}

impl Sample {
    pub fn new(cpu: f64, rss: f64, network: f64) -> Self {
        Self { rss, cpu, network }
    }

    /// Value of the given dimension
    pub fn value(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Rss => self.rss,
            Dimension::Network => self.network,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.cpu.is_finite() && self.rss.is_finite() && self.network.is_finite()
    }
}

/// Sample dimension used for percentile selection and rounding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Cpu,
    Rss,
    Network,
}

/// Identity of a monitored instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub namespace: String,
    pub name: String,
}

impl InstanceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Lifecycle status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    /// Idle or unknown phase
    Idle,
    Terminated,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Idle => "idle",
            InstanceStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four recommendation fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationField {
    CpuRequest,
    CpuLimit,
    RssRequest,
    RssLimit,
}

impl RecommendationField {
    pub const ALL: [RecommendationField; 4] = [
        RecommendationField::CpuRequest,
        RecommendationField::CpuLimit,
        RecommendationField::RssRequest,
        RecommendationField::RssLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationField::CpuRequest => "cpu_request",
            RecommendationField::CpuLimit => "cpu_limit",
            RecommendationField::RssRequest => "rss_request",
            RecommendationField::RssLimit => "rss_limit",
        }
    }
}

impl fmt::Display for RecommendationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU/memory requests and limits.
///
/// `None` means "not computable" (no samples yet, or the platform cannot
/// enforce the value). Used for computed recommendations, watermarks and
/// the original values configured on a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub cpu_request: Option<f64>,
    pub cpu_limit: Option<f64>,
    pub rss_request: Option<f64>,
    pub rss_limit: Option<f64>,
}

impl Recommendation {
    pub const UNKNOWN: Recommendation = Recommendation {
        cpu_request: None,
        cpu_limit: None,
        rss_request: None,
        rss_limit: None,
    };

    pub fn get(&self, field: RecommendationField) -> Option<f64> {
        match field {
            RecommendationField::CpuRequest => self.cpu_request,
            RecommendationField::CpuLimit => self.cpu_limit,
            RecommendationField::RssRequest => self.rss_request,
            RecommendationField::RssLimit => self.rss_limit,
        }
    }

    fn slot(&mut self, field: RecommendationField) -> &mut Option<f64> {
        match field {
            RecommendationField::CpuRequest => &mut self.cpu_request,
            RecommendationField::CpuLimit => &mut self.cpu_limit,
            RecommendationField::RssRequest => &mut self.rss_request,
            RecommendationField::RssLimit => &mut self.rss_limit,
        }
    }

    /// Set a field, ignoring negative or non-finite input.
    ///
    /// Returns whether the value was accepted.
    pub fn set(&mut self, field: RecommendationField, value: f64) -> bool {
        if !value.is_finite() || value < 0.0 {
            return false;
        }
        *self.slot(field) = Some(value);
        true
    }

    /// Replace a field with an optional value; `None` and invalid values
    /// leave the field unchanged.
    pub fn set_opt(&mut self, field: RecommendationField, value: Option<f64>) -> bool {
        value.map(|v| self.set(field, v)).unwrap_or(false)
    }

    /// True when no field carries a value
    pub fn is_unknown(&self) -> bool {
        RecommendationField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// An instance as reported by discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredInstance {
    pub key: InstanceKey,
    pub application: String,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_policy: Option<GcPolicy>,
    /// Requests/limits as configured on the deployment
    #[serde(default)]
    pub original: Recommendation,
}

/// Read-only view of an instance's state
#[derive(Debug, Clone, Serialize)]
pub struct InstanceView {
    pub key: InstanceKey,
    pub application: String,
    pub status: InstanceStatus,
    pub sample_count: usize,
    pub original: Recommendation,
    pub current: Recommendation,
    pub watermark: Recommendation,
}

/// Quantities in the API shape: memory as `"<value>M"`, cpu in cores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceQuantities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub requests: ResourceQuantities,
    pub limits: ResourceQuantities,
}

/// Heap sizing for one GC policy, in MiB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeRecommendation {
    pub gc_policy: GcPolicy,
    pub heap: String,
    pub non_heap: String,
    /// Whether the heap value was capped below the memory request
    pub capped: bool,
}

/// Recommendation API payload for one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecommendation {
    pub application_name: String,
    pub resources: Resources,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime: Vec<RuntimeRecommendation>,
}

impl ApplicationRecommendation {
    pub fn new(application_name: impl Into<String>, recommendation: &Recommendation) -> Self {
        Self {
            application_name: application_name.into(),
            resources: Resources {
                requests: ResourceQuantities {
                    memory: recommendation.rss_request.map(format_memory),
                    cpu: recommendation.cpu_request,
                },
                limits: ResourceQuantities {
                    memory: recommendation.rss_limit.map(format_memory),
                    cpu: recommendation.cpu_limit,
                },
            },
            runtime: Vec::new(),
        }
    }
}

/// Whether an application already has recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generated {
    Yes,
    No,
}

/// Listing API payload for one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub application_name: String,
    pub recommendations_generated: Generated,
    pub status: InstanceStatus,
}

/// Format a MiB quantity as `"<value>M"`, trimmed to two decimals
pub fn format_memory(mib: f64) -> String {
    let rounded = (mib * 100.0).round() / 100.0;
    format!("{}M", rounded)
}
