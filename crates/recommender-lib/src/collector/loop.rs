//! Collection and recommendation loop
//!
//! Each tick discovers instances, recovers history for applications seen
//! for the first time, collects one sample per live instance and runs a
//! recommendation cycle on the engine.

use super::{HistorySource, MetricsSource};
use crate::engine::Engine;
use crate::health::{Component, HealthRegistry};
use crate::models::{DiscoveredInstance, InstanceStatus, Recommendation};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::watermark;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Base collection interval (default: 10 seconds)
    pub interval: Duration,
    /// Maximum jitter added to the first tick (default: 1 second)
    pub jitter: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Counters for one pass of the loop
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleStats {
    pub discovered: usize,
    pub new_applications: usize,
    pub recovered: usize,
    pub samples_recorded: usize,
    pub samples_discarded: usize,
    pub collection_errors: usize,
    pub recomputed: usize,
    pub failed: usize,
    /// Applications whose published value moved this cycle
    pub raised: usize,
}

/// Drives the engine from a metrics source
pub struct CollectionLoop {
    engine: Arc<Engine>,
    source: Arc<dyn MetricsSource>,
    history: Arc<dyn HistorySource>,
    health: HealthRegistry,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    config: CollectionConfig,
    /// Last value exported per application
    exported: HashMap<String, Recommendation>,
}

impl CollectionLoop {
    pub fn new(
        engine: Arc<Engine>,
        source: Arc<dyn MetricsSource>,
        history: Arc<dyn HistorySource>,
        health: HealthRegistry,
        logger: StructuredLogger,
        config: CollectionConfig,
    ) -> Self {
        Self {
            engine,
            source,
            history,
            health,
            metrics: EngineMetrics::new(),
            logger,
            config,
            exported: HashMap::new(),
        }
    }

    /// Run until the shutdown channel fires
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting collection loop"
        );

        tokio::time::sleep(Duration::from_millis(rand_jitter(
            self.config.jitter.as_millis() as u64,
        )))
        .await;

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    let result = self.run_once().await;
                    let elapsed = start.elapsed();
                    cycle_count += 1;

                    self.metrics.observe_cycle_latency(elapsed.as_secs_f64());

                    match result {
                        Ok(stats) => {
                            if cycle_count % 6 == 0 {
                                debug!(
                                    instances = stats.discovered,
                                    recomputed = stats.recomputed,
                                    failed = stats.failed,
                                    collection_errors = stats.collection_errors,
                                    elapsed_ms = elapsed.as_millis(),
                                    "Collection cycle complete"
                                );
                            }
                        }
                        Err(e) => warn!(error = %e, "Collection cycle failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down collection loop");
                    break;
                }
            }
        }
    }

    /// One full pass: discovery, recovery, sampling and recomputation
    pub async fn run_once(&mut self) -> Result<CycleStats> {
        let mut stats = CycleStats::default();

        let instances = match self.source.discover().await.context("Discovery failed") {
            Ok(instances) => instances,
            Err(e) => {
                self.metrics.inc_collection_errors();
                self.health
                    .set_unhealthy(Component::Collector, format!("{:#}", e))
                    .await;
                return Err(e);
            }
        };
        stats.discovered = instances.len();

        let summary = self.engine.sync_discovery(&instances);
        for key in &summary.terminated {
            self.logger.log_terminated(key);
        }

        stats.new_applications = summary.new_applications.len();
        for application in &summary.new_applications {
            if self.recover(application).await {
                stats.recovered += 1;
            }
        }

        for instance in instances
            .iter()
            .filter(|i| i.status != InstanceStatus::Terminated)
        {
            self.collect(instance, &mut stats).await;
        }

        if stats.collection_errors > 0 && stats.collection_errors >= stats.discovered {
            self.health
                .set_degraded(Component::Collector, "No instance could be sampled")
                .await;
        } else {
            self.health.set_healthy(Component::Collector).await;
        }

        let report = self.engine.run_cycle();
        stats.recomputed = report.recomputed;
        stats.failed = report.failed.len();
        self.metrics.inc_cycle_errors(report.failed.len() as u64);

        for (application, published) in &report.published {
            let previous = self
                .exported
                .get(application)
                .copied()
                .unwrap_or(Recommendation::UNKNOWN);
            let raised = watermark::raised_fields(&previous, published);
            if !raised.is_empty() {
                stats.raised += 1;
                self.logger.log_published(application, published, &raised);
            }
            self.metrics.set_published(application, published);
            self.exported.insert(application.clone(), *published);
        }

        self.metrics
            .set_instances_active(self.engine.active_instance_count() as i64);
        self.metrics
            .set_applications_tracked(self.engine.application_count() as i64);

        if report.failed.is_empty() {
            self.health.set_healthy(Component::Engine).await;
        } else {
            self.health
                .set_degraded(
                    Component::Engine,
                    format!("{} instance(s) failed to recompute", report.failed.len()),
                )
                .await;
        }
        self.health.mark_cycle_completed().await;

        Ok(stats)
    }

    /// Seed a new application from the metrics store.
    ///
    /// Returns whether any historical value was found.
    async fn recover(&self, application: &str) -> bool {
        match self.history.last_published(application).await {
            Ok(history) if history.is_unknown() => false,
            Ok(history) => {
                self.engine.recover(application, &history);
                self.logger.log_recovered(application, &history);
                true
            }
            Err(e) => {
                let message = format!("{:#}", e);
                self.logger.log_recovery_failed(application, &message);
                self.health.set_degraded(Component::History, message).await;
                false
            }
        }
    }

    async fn collect(&self, instance: &DiscoveredInstance, stats: &mut CycleStats) {
        match self.source.sample(&instance.key).await {
            Ok(Some(sample)) => match self.engine.record_sample(&instance.key, sample) {
                Ok(true) => {
                    stats.samples_recorded += 1;
                    self.metrics.inc_samples_recorded();
                }
                Ok(false) => {
                    stats.samples_discarded += 1;
                    self.metrics.inc_samples_discarded();
                }
                Err(e) => {
                    warn!(instance = %instance.key, error = %e, "Rejected sample");
                }
            },
            Ok(None) => debug!(instance = %instance.key, "No sample available"),
            Err(e) => {
                stats.collection_errors += 1;
                self.metrics.inc_collection_errors();
                debug!(instance = %instance.key, error = %e, "Failed to collect sample");
                return;
            }
        }

        let Some(policy) = instance.gc_policy else {
            return;
        };
        match self.source.heap_sample(&instance.key, policy).await {
            Ok(Some(model)) => {
                if let Err(e) = self.engine.record_heap_sample(&instance.key, model) {
                    warn!(instance = %instance.key, error = %e, "Rejected heap sample");
                }
            }
            Ok(None) => {}
            Err(e) => {
                stats.collection_errors += 1;
                self.metrics.inc_collection_errors();
                debug!(instance = %instance.key, error = %e, "Failed to collect heap sample");
            }
        }
    }
}

/// Random value between 0 and max_ms, used to spread start times
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder for the collection loop
pub struct CollectionLoopBuilder {
    engine: Option<Arc<Engine>>,
    source: Option<Arc<dyn MetricsSource>>,
    history: Option<Arc<dyn HistorySource>>,
    health: HealthRegistry,
    logger: StructuredLogger,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    pub fn new() -> Self {
        Self {
            engine: None,
            source: None,
            history: None,
            health: HealthRegistry::new(),
            logger: StructuredLogger::new("unknown"),
            config: CollectionConfig::default(),
        }
    }

    pub fn engine(mut self, engine: Arc<Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistorySource>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<CollectionLoop> {
        let engine = self
            .engine
            .ok_or_else(|| anyhow::anyhow!("Engine is required"))?;
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Metrics source is required"))?;
        let history = self
            .history
            .ok_or_else(|| anyhow::anyhow!("History source is required"))?;

        Ok(CollectionLoop::new(
            engine,
            source,
            history,
            self.health,
            self.logger,
            self.config,
        ))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
