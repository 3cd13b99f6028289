//! Observability for the recommender
//!
//! Provides:
//! - Prometheus metrics (cycle latency, sample counts, published recommendations)
//! - Structured JSON logging with tracing

use crate::models::{InstanceKey, Recommendation, RecommendationField};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Name of the gauge carrying published recommendations.
///
/// Recovery after a restart queries this series back from the metrics store.
pub const PUBLISHED_RECOMMENDATION_METRIC: &str = "recommender_published_recommendation";

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    cycle_latency_seconds: Histogram,
    instances_active: IntGauge,
    applications_tracked: IntGauge,
    samples_recorded: IntCounter,
    samples_discarded: IntCounter,
    cycle_errors: IntCounter,
    collection_errors: IntCounter,
    published_recommendation: GaugeVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "recommender_cycle_latency_seconds",
                "Time spent on one collection and recommendation cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            instances_active: register_int_gauge!(
                "recommender_instances_active",
                "Number of instances not yet terminated"
            )
            .expect("Failed to register instances_active"),

            applications_tracked: register_int_gauge!(
                "recommender_applications_tracked",
                "Number of applications known to the engine"
            )
            .expect("Failed to register applications_tracked"),

            samples_recorded: register_int_counter!(
                "recommender_samples_recorded_total",
                "Utilization samples appended to instance stores"
            )
            .expect("Failed to register samples_recorded"),

            samples_discarded: register_int_counter!(
                "recommender_samples_discarded_total",
                "Utilization samples discarded as idle"
            )
            .expect("Failed to register samples_discarded"),

            cycle_errors: register_int_counter!(
                "recommender_cycle_errors_total",
                "Instances whose recommendation failed during a cycle"
            )
            .expect("Failed to register cycle_errors"),

            collection_errors: register_int_counter!(
                "recommender_collection_errors_total",
                "Failed queries against the metrics store"
            )
            .expect("Failed to register collection_errors"),

            published_recommendation: register_gauge_vec!(
                PUBLISHED_RECOMMENDATION_METRIC,
                "Published recommendation per application and field",
                &["application", "field"]
            )
            .expect("Failed to register published_recommendation"),
        }
    }
}

/// Handle to the process-wide engine metrics.
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn set_instances_active(&self, count: i64) {
        self.inner().instances_active.set(count);
    }

    pub fn set_applications_tracked(&self, count: i64) {
        self.inner().applications_tracked.set(count);
    }

    pub fn inc_samples_recorded(&self) {
        self.inner().samples_recorded.inc();
    }

    pub fn inc_samples_discarded(&self) {
        self.inner().samples_discarded.inc();
    }

    pub fn inc_cycle_errors(&self, count: u64) {
        self.inner().cycle_errors.inc_by(count);
    }

    pub fn inc_collection_errors(&self) {
        self.inner().collection_errors.inc();
    }

    /// Export an application's published values; unknown fields are skipped
    pub fn set_published(&self, application: &str, recommendation: &Recommendation) {
        for field in RecommendationField::ALL {
            if let Some(value) = recommendation.get(field) {
                self.inner()
                    .published_recommendation
                    .with_label_values(&[application, field.as_str()])
                    .set(value);
            }
        }
    }

    /// Value currently exported for one application field
    pub fn published(&self, application: &str, field: RecommendationField) -> f64 {
        self.inner()
            .published_recommendation
            .with_label_values(&[application, field.as_str()])
            .get()
    }
}

/// Structured logger for recommender events
#[derive(Clone)]
pub struct StructuredLogger {
    platform: String,
}

impl StructuredLogger {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64) {
        info!(
            event = "recommender_started",
            platform = %self.platform,
            version = %version,
            interval_secs = interval_secs,
            "Resource recommender started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "recommender_shutdown",
            platform = %self.platform,
            reason = %reason,
            "Resource recommender shutting down"
        );
    }

    /// Log a published value that moved
    pub fn log_published(
        &self,
        application: &str,
        recommendation: &Recommendation,
        raised: &[RecommendationField],
    ) {
        let raised: Vec<&str> = raised.iter().map(|f| f.as_str()).collect();
        info!(
            event = "recommendation_published",
            platform = %self.platform,
            application = %application,
            cpu_request = ?recommendation.cpu_request,
            cpu_limit = ?recommendation.cpu_limit,
            rss_request = ?recommendation.rss_request,
            rss_limit = ?recommendation.rss_limit,
            raised = ?raised,
            "Published recommendation raised"
        );
    }

    pub fn log_recovered(&self, application: &str, history: &Recommendation) {
        info!(
            event = "watermark_recovered",
            platform = %self.platform,
            application = %application,
            cpu_request = ?history.cpu_request,
            cpu_limit = ?history.cpu_limit,
            rss_request = ?history.rss_request,
            rss_limit = ?history.rss_limit,
            "Recovered previously published recommendation"
        );
    }

    pub fn log_recovery_failed(&self, application: &str, error: &str) {
        warn!(
            event = "watermark_recovery_failed",
            platform = %self.platform,
            application = %application,
            error = %error,
            "Could not recover published recommendation, starting from scratch"
        );
    }

    pub fn log_terminated(&self, instance: &InstanceKey) {
        info!(
            event = "instance_terminated",
            platform = %self.platform,
            namespace = %instance.namespace,
            instance = %instance.name,
            "Instance no longer reported by discovery"
        );
    }
}
