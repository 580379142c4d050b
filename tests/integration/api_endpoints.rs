//! Integration tests for the query API
//!
//! These tests verify that:
//! - Every route returns the documented JSON
//! - Storage not-found maps to 404, other storage errors to 500
//! - The server binds and serves over a real socket
//! - A failed bind still allows the ordered poller stop and store close

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use latency_monitor::actors::poller::{Poller, shutdown};
use latency_monitor::api::{ApiConfig, ApiState, router, spawn_api_server};
use latency_monitor::query::QueryFacade;
use latency_monitor::storage::{MemoryBackend, StorageBackend, StorageError};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::helpers::{create_manual_poller_config, create_seeded_memory};

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn app_for(storage: Arc<MemoryBackend>) -> axum::Router {
    router(ApiState::new(QueryFacade::new(storage)))
}

#[tokio::test]
async fn test_health() {
    let app = app_for(Arc::new(MemoryBackend::new()));

    let (status, body) = get(app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
    assert!(body.get("poller").is_none());
}

#[tokio::test]
async fn test_health_reports_poller() {
    let storage = Arc::new(MemoryBackend::new());
    let poller = Poller::with_http(
        create_manual_poller_config(vec![], Duration::from_secs(1)),
        storage.clone(),
    )
    .unwrap()
    .start();
    poller.tick_now().await.unwrap();

    let state = ApiState::new(QueryFacade::new(storage)).with_poller(poller.monitor());
    let (status, body) = get(router(state), "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["poller"], "running");
    assert_eq!(body["stats"]["ticks"], 1);

    poller.stop().await.unwrap();
}

#[tokio::test]
async fn test_url_info() {
    let storage = create_seeded_memory(&[
        ("https://google.com", 2_000_000),
        ("https://google.com", 4_000_000),
        ("https://down.example", 10),
        ("https://down.example", -1),
    ])
    .await;

    let (status, body) = get(
        app_for(storage.clone()),
        "/api/v1/urls/info?url=https://google.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isAvailable": true, "avgLatencyNs": 4_000_000 }));

    let (status, body) = get(app_for(storage), "/api/v1/urls/info?url=https://down.example").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isAvailable": false, "avgLatencyNs": 0 }));
}

#[tokio::test]
async fn test_url_info_unknown_is_404() {
    let app = app_for(Arc::new(MemoryBackend::new()));

    let (status, body) = get(app, "/api/v1/urls/info?url=https://nope.example").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("https://nope.example"));
}

#[tokio::test]
async fn test_url_info_requires_url() {
    let storage = Arc::new(MemoryBackend::new());

    let (status, body) = get(app_for(storage.clone()), "/api/v1/urls/info").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "url must not be empty" }));

    let (status, body) = get(app_for(storage), "/api/v1/urls/info?url=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "url must not be empty" }));
}

#[tokio::test]
async fn test_min_and_max() {
    let storage = create_seeded_memory(&[("https://a", 100), ("https://b", 200)]).await;

    let (status, body) = get(app_for(storage.clone()), "/api/v1/latency/min").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "url": "https://a", "avgLatencyNs": 100 }));

    let (status, body) = get(app_for(storage), "/api/v1/latency/max").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "url": "https://b", "avgLatencyNs": 200 }));
}

#[tokio::test]
async fn test_closed_storage_is_500() {
    let storage = create_seeded_memory(&[("https://a", 100)]).await;
    storage.close().await.unwrap();

    let (status, body) = get(app_for(storage), "/api/v1/latency/min").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_served_over_socket() {
    let storage = create_seeded_memory(&[("https://a", 7_000_000)]).await;
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: true,
    };
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let addr = spawn_api_server(config, ApiState::new(QueryFacade::new(storage)), async {
        shutdown_rx.await.ok();
    })
    .await
    .unwrap();

    let body: Value = reqwest::get(format!("http://{addr}/api/v1/latency/max"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "url": "https://a", "avgLatencyNs": 7_000_000 }));

    shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn test_failed_bind_still_drains_poller_and_closes_store() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let storage = Arc::new(MemoryBackend::new());

    let mock_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("HEAD"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .mount(&mock_server)
        .await;
    let url = mock_server.uri();

    let poller = Poller::with_http(
        create_manual_poller_config(vec![url.clone()], Duration::from_secs(2)),
        storage.clone(),
    )
    .unwrap()
    .start();
    poller.tick_now().await.unwrap();

    let config = ApiConfig {
        bind_addr: taken.local_addr().unwrap(),
        enable_cors: true,
    };
    let state = ApiState::new(QueryFacade::new(storage.clone())).with_poller(poller.monitor());
    let served = spawn_api_server(config, state, std::future::pending()).await;
    assert!(served.is_err());

    let stats = shutdown(poller, storage.as_ref()).await.unwrap();
    assert_eq!(stats.persisted, 1);
    assert_eq!(storage.history(&url).await.len(), 1);
    assert_matches!(storage.get_min_latency().await, Err(StorageError::Closed));
}
