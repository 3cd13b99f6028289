//! Service configuration

use anyhow::{Context, Result};
use recommender_lib::analysis::{Platform, RecommendationPolicy};
use recommender_lib::collector::QueryTemplates;
use serde::Deserialize;

/// Environment variable naming an optional configuration file
const CONFIG_PATH_VAR: &str = "RECOMMENDER_CONFIG";

/// Recommender configuration.
///
/// Read from the optional file named by `RECOMMENDER_CONFIG`, then from
/// `RECOMMENDER_*` environment variables (nested keys use `__`, as in
/// `RECOMMENDER_QUERIES__CPU`).
#[derive(Debug, Clone, Deserialize)]
pub struct RecommenderConfig {
    /// API server port for recommendations, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Base URL of the Prometheus server
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    #[serde(default)]
    pub platform: Platform,

    /// Collection interval in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// Range searched for previously published values after a restart
    #[serde(default = "default_history_lookback")]
    pub history_lookback: String,

    pub cpu_buffer_factor: Option<f64>,
    pub memory_buffer_factor: Option<f64>,
    pub spike_floor_mib: Option<f64>,
    pub idle_cpu_threshold: Option<f64>,

    #[serde(default)]
    pub queries: QueryTemplates,
}

fn default_api_port() -> u16 {
    8080
}

fn default_prometheus_url() -> String {
    "http://prometheus:9090".to_string()
}

fn default_collection_interval() -> u64 {
    10
}

fn default_history_lookback() -> String {
    "30d".to_string()
}

impl RecommenderConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("RECOMMENDER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        let parsed: Self = config
            .try_deserialize()
            .context("Invalid recommender configuration")?;

        if parsed.collection_interval_secs == 0 {
            anyhow::bail!("collection_interval_secs must be positive");
        }
        Ok(parsed)
    }

    /// Platform policy with configured overrides applied
    pub fn policy(&self) -> RecommendationPolicy {
        let mut policy = RecommendationPolicy::for_platform(self.platform);
        if let Some(factor) = self.cpu_buffer_factor {
            policy.cpu_buffer_factor = factor;
        }
        if let Some(factor) = self.memory_buffer_factor {
            policy.memory_buffer_factor = factor;
        }
        if let Some(floor) = self.spike_floor_mib {
            policy.spike_floor = floor;
        }
        if let Some(threshold) = self.idle_cpu_threshold {
            policy.idle_cpu_threshold = threshold;
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(overrides: &[(&str, &str)]) -> Result<RecommenderConfig> {
        let mut builder = config::Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        RecommenderConfig::from_config(builder.build()?)
    }

    #[test]
    fn test_defaults() {
        let config = build(&[]).unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.platform, Platform::Kubernetes);
        assert_eq!(config.collection_interval_secs, 10);
        assert_eq!(config.history_lookback, "30d");
        assert!(config.queries.cpu.contains("{pod}"));
        assert_eq!(
            config.policy(),
            RecommendationPolicy::for_platform(Platform::Kubernetes)
        );
    }

    #[test]
    fn test_docker_policy_with_overrides() {
        let config = build(&[
            ("platform", "docker"),
            ("cpu_buffer_factor", "1.5"),
            ("spike_floor_mib", "64"),
        ])
        .unwrap();

        let policy = config.policy();
        assert_eq!(policy.platform, Platform::Docker);
        assert!(!policy.cpu_requests_enforceable);
        assert_eq!(policy.cpu_buffer_factor, 1.5);
        assert_eq!(policy.spike_floor, 64.0);
    }

    #[test]
    fn test_query_override_keeps_other_defaults() {
        let config = build(&[("queries.cpu", "my_cpu{pod=\"{pod}\"}")]).unwrap();
        assert_eq!(config.queries.cpu, "my_cpu{pod=\"{pod}\"}");
        assert_eq!(config.queries.rss, QueryTemplates::default().rss);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(build(&[("collection_interval_secs", "0")]).is_err());
    }
}
