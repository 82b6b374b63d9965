//! Health Check API Tests

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let (status, body) = app.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["websocket_connections"], 0);
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_health_counts_gateway_connections() {
    let app = TestApp::new();
    let _subscriber = app.subscriber(1, &[]);

    let (_, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(body["websocket_connections"], 1);
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();

    let (status, body) = app.request("GET", "/health/live", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_registry() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chat_core_"));
}
