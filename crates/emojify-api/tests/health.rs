//! Health aggregation over the in-memory doubles and through the router.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use emojify_api::{
    AppConfig, AppState, HealthAggregator, MemoryCache, MemoryJobClient, OverallStatus, build_app,
};
use serde_json::Value;
use tower::ServiceExt;

#[tokio::test]
async fn not_found_probe_counts_as_reachable() {
    let cache = Arc::new(MemoryCache::new());
    let jobs = Arc::new(MemoryJobClient::new());
    let health = HealthAggregator::new(cache.clone(), jobs);

    let status = health.check().await;

    assert_eq!(status.overall, OverallStatus::Ok);
    assert!(status.components["cache"].ok);
    assert!(status.components["jobs"].ok);
    assert_eq!(cache.get_calls(), 1);
}

#[tokio::test]
async fn one_component_down_is_degraded() {
    let cache = Arc::new(MemoryCache::new());
    let jobs = Arc::new(MemoryJobClient::new());
    jobs.set_unreachable(true);
    let health = HealthAggregator::new(cache, jobs);

    let status = health.check().await;

    assert_eq!(status.overall, OverallStatus::Degraded);
    assert!(status.components["cache"].ok);
    assert!(!status.components["jobs"].ok);
    assert!(status.components["jobs"].detail.contains("unreachable"));
}

#[tokio::test]
async fn all_components_down_is_fail() {
    let cache = Arc::new(MemoryCache::new());
    cache.set_unavailable(true);
    let jobs = Arc::new(MemoryJobClient::new());
    jobs.set_unreachable(true);
    let health = HealthAggregator::new(cache, jobs);

    assert_eq!(health.check().await.overall, OverallStatus::Fail);
}

#[tokio::test]
async fn health_route_reports_ok() {
    let state = AppState::new(Arc::new(MemoryCache::new()), Arc::new(MemoryJobClient::new()));
    let app = build_app(&AppConfig::default(), state, None);

    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("OK"));
}

#[tokio::test]
async fn health_route_reports_unavailable_with_detail() {
    let cache = Arc::new(MemoryCache::new());
    cache.set_unavailable(true);
    let state = AppState::new(cache, Arc::new(MemoryJobClient::new()));
    let app = build_app(&AppConfig::default(), state, None);

    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["overall"], "DEGRADED");
    assert_eq!(body["components"]["cache"]["ok"], false);
    assert!(
        body["components"]["cache"]["detail"]
            .as_str()
            .unwrap()
            .starts_with("memory:")
    );
}
