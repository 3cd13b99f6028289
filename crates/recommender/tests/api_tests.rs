//! Integration tests for the recommender API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use recommender_lib::{
    api::{create_router, AppState},
    health::{Component, HealthRegistry},
    observability::EngineMetrics,
    DiscoveredInstance, Engine, InstanceKey, InstanceStatus, Platform, Recommendation,
    RecommendationPolicy, Sample,
};
use std::sync::Arc;
use tower::ServiceExt;

fn instance(name: &str, application: &str) -> DiscoveredInstance {
    DiscoveredInstance {
        key: InstanceKey::new("default", name),
        application: application.to_string(),
        status: InstanceStatus::Running,
        gc_policy: None,
        original: Recommendation::UNKNOWN,
    }
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();

    let engine = Arc::new(Engine::new(RecommendationPolicy::for_platform(
        Platform::Kubernetes,
    )));
    let state = Arc::new(AppState::new(engine, health_registry, EngineMetrics::new()));
    let router = create_router(state.clone());

    (router, state)
}

/// Two applications: `petclinic` with samples, `acmeair` without
fn populate(engine: &Engine) {
    engine.sync_discovery(&[instance("petclinic-1", "petclinic"), instance("acmeair-1", "acmeair")]);

    let key = InstanceKey::new("default", "petclinic-1");
    for (cpu, rss) in [(0.1, 100.0), (0.9, 102.0), (0.95, 150.0), (0.92, 101.0), (0.05, 100.0)] {
        engine.record_sample(&key, Sample::new(cpu, rss, 0.0)).unwrap();
    }
    engine.run_cycle();
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_recommendations_for_application() {
    let (app, state) = setup_test_app().await;
    populate(&state.engine);

    let (status, body) = get_json(app, "/recommendations?application_name=petclinic").await;
    assert_eq!(status, StatusCode::OK);

    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    let petclinic = &items[0];
    assert_eq!(petclinic["application_name"], "petclinic");
    let cpu_limit = petclinic["resources"]["limits"]["cpu"].as_f64().unwrap();
    let cpu_request = petclinic["resources"]["requests"]["cpu"].as_f64().unwrap();
    assert!((cpu_limit - 1.1).abs() < 1e-9);
    assert!((cpu_request - 1.0).abs() < 1e-9);
    // request from the busiest sample, limit from request plus the 50M spike floor
    assert_eq!(petclinic["resources"]["requests"]["memory"], "150M");
    assert_eq!(petclinic["resources"]["limits"]["memory"], "200M");
}

#[tokio::test]
async fn test_recommendations_unknown_application_is_404() {
    let (app, state) = setup_test_app().await;
    populate(&state.engine);

    let (status, body) = get_json(app, "/recommendations?application_name=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_recommendations_omit_unknown_fields() {
    let (app, state) = setup_test_app().await;
    populate(&state.engine);

    let (status, body) = get_json(app, "/recommendations").await;
    assert_eq!(status, StatusCode::OK);

    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    let acmeair = items
        .iter()
        .find(|r| r["application_name"] == "acmeair")
        .unwrap();
    assert!(acmeair["resources"]["requests"].get("cpu").is_none());
    assert!(acmeair["resources"]["limits"].get("memory").is_none());
}

#[tokio::test]
async fn test_list_applications() {
    let (app, state) = setup_test_app().await;
    populate(&state.engine);

    let (status, body) = get_json(app, "/listApplications").await;
    assert_eq!(status, StatusCode::OK);

    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["application_name"], "acmeair");
    assert_eq!(items[0]["recommendations_generated"], "no");
    assert_eq!(items[0]["status"], "idle");
    assert_eq!(items[1]["application_name"], "petclinic");
    assert_eq!(items[1]["recommendations_generated"], "yes");
    assert_eq!(items[1]["status"], "running");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(Component::History, "Recovery failed")
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert!(health["components"]["engine"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(Component::Collector, "Prometheus unreachable")
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_first_cycle() {
    let (app, state) = setup_test_app().await;

    let (status, readiness) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.mark_cycle_completed().await;
    let (status, readiness) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_published_values() {
    let (app, state) = setup_test_app().await;
    populate(&state.engine);

    let published = state.engine.published("petclinic").unwrap();
    state.metrics.set_published("petclinic", &published);
    state.metrics.observe_cycle_latency(0.01);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("recommender_cycle_latency_seconds_bucket"));
    assert!(metrics_text
        .contains(r#"recommender_published_recommendation{application="petclinic",field="cpu_limit"}"#));
}
