//! Platform policy for the recommendation algorithm

use crate::models::Dimension;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Percentile whose upper subset drives request sizing
pub const REQUEST_PERCENTILE: f64 = 80.0;

/// Minimum headroom above memory requests, in MiB
pub const DEFAULT_SPIKE_FLOOR_MIB: f64 = 50.0;

/// Memory requests are rounded up to multiples of this step
pub const MEMORY_ROUNDING_STEP: f64 = 5.0;

/// Heap recommendations above the memory request are capped to this share of it
pub const HEAP_CAP_RATIO: f64 = 0.7;

/// CPU usage (cores) below which a sample is treated as idle and discarded
pub const DEFAULT_IDLE_CPU_THRESHOLD: f64 = 0.001;

/// Platform the monitored workloads run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Kubernetes,
    Docker,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Kubernetes => "kubernetes",
            Platform::Docker => "docker",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kubernetes" | "k8s" | "openshift" => Ok(Platform::Kubernetes),
            "docker" => Ok(Platform::Docker),
            other => Err(format!("unsupported platform: {}", other)),
        }
    }
}

/// Constants the algorithm is parameterized by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPolicy {
    pub platform: Platform,
    /// Multiplier applied to peak CPU for the limit
    pub cpu_buffer_factor: f64,
    /// Multiplier applied to peak RSS for the limit
    pub memory_buffer_factor: f64,
    /// Smallest CPU request the platform enforces (cores)
    pub min_cpu_request: f64,
    /// Smallest CPU limit the platform enforces (cores)
    pub min_cpu_limit: f64,
    /// Whether the platform enforces CPU requests at all
    pub cpu_requests_enforceable: bool,
    pub request_percentile: f64,
    /// Dimension whose upper percentile selects samples for memory requests
    pub memory_selection: Dimension,
    pub spike_floor: f64,
    pub idle_cpu_threshold: f64,
    pub heap_cap_ratio: f64,
}

impl RecommendationPolicy {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Kubernetes => Self {
                platform,
                cpu_buffer_factor: 1.2,
                memory_buffer_factor: 1.2,
                min_cpu_request: 0.1,
                min_cpu_limit: 0.1,
                cpu_requests_enforceable: true,
                request_percentile: REQUEST_PERCENTILE,
                memory_selection: Dimension::Cpu,
                spike_floor: DEFAULT_SPIKE_FLOOR_MIB,
                idle_cpu_threshold: DEFAULT_IDLE_CPU_THRESHOLD,
                heap_cap_ratio: HEAP_CAP_RATIO,
            },
            // Docker has no CPU request concept; --cpus accepts 0.01 at minimum.
            Platform::Docker => Self {
                platform,
                cpu_buffer_factor: 1.15,
                memory_buffer_factor: 1.2,
                min_cpu_request: 0.01,
                min_cpu_limit: 0.01,
                cpu_requests_enforceable: false,
                request_percentile: REQUEST_PERCENTILE,
                memory_selection: Dimension::Cpu,
                spike_floor: DEFAULT_SPIKE_FLOOR_MIB,
                idle_cpu_threshold: DEFAULT_IDLE_CPU_THRESHOLD,
                heap_cap_ratio: HEAP_CAP_RATIO,
            },
        }
    }
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self::for_platform(Platform::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("kubernetes".parse::<Platform>(), Ok(Platform::Kubernetes));
        assert_eq!("Docker".parse::<Platform>(), Ok(Platform::Docker));
        assert!("nomad".parse::<Platform>().is_err());
    }

    #[test]
    fn test_docker_cannot_enforce_requests() {
        let policy = RecommendationPolicy::for_platform(Platform::Docker);
        assert!(!policy.cpu_requests_enforceable);
        assert_eq!(policy.cpu_buffer_factor, 1.15);
        assert_eq!(policy.memory_buffer_factor, 1.2);
    }

    #[test]
    fn test_default_policy_is_kubernetes() {
        let policy = RecommendationPolicy::default();
        assert_eq!(policy.platform, Platform::Kubernetes);
        assert!(policy.cpu_requests_enforceable);
        assert_eq!(policy.request_percentile, REQUEST_PERCENTILE);
        assert_eq!(policy.memory_selection, Dimension::Cpu);
    }
}
