//! Resource recommender service
//!
//! Polls Prometheus for instance utilization, keeps per-application
//! high-water-mark recommendations and serves them over HTTP.

use anyhow::Result;
use recommender_lib::{
    api::{self, AppState},
    collector::{CollectionLoopBuilder, PrometheusSource},
    health::HealthRegistry,
    observability::{EngineMetrics, StructuredLogger},
    Engine,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const RECOMMENDER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::RecommenderConfig::load()?;
    info!(
        platform = %config.platform,
        prometheus_url = %config.prometheus_url,
        "Recommender configured"
    );

    let health_registry = HealthRegistry::new();

    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(config.platform.as_str());
    logger.log_startup(RECOMMENDER_VERSION, config.collection_interval_secs);

    let engine = Arc::new(Engine::new(config.policy()));
    let prometheus = Arc::new(PrometheusSource::new(
        &config.prometheus_url,
        config.queries.clone(),
        config.history_lookback.clone(),
    )?);

    let collection_loop = CollectionLoopBuilder::new()
        .engine(engine.clone())
        .source(prometheus.clone())
        .history(prometheus)
        .health(health_registry.clone())
        .logger(logger.clone())
        .interval(Duration::from_secs(config.collection_interval_secs))
        .build()?;

    let (shutdown_tx, _) = broadcast::channel(1);

    let loop_handle = tokio::spawn(collection_loop.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(AppState::new(engine, health_registry, metrics));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    if let Err(e) = loop_handle.await {
        error!(error = %e, "Collection loop task failed");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}
