//! End-to-end tests of the polling pipeline against real HTTP servers
//!
//! These tests verify that:
//! - Every dispatched probe is persisted before `stop` returns
//! - Timeouts are recorded as unavailable (`-1`)
//! - Other transport errors are dropped without a history entry
//! - The poller reports its lifecycle and counters

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use latency_monitor::actors::messages::PollerState;
use latency_monitor::actors::poller::Poller;
use latency_monitor::query::{QueryFacade, UrlInfo};
use latency_monitor::storage::{MemoryBackend, StorageBackend, StorageError};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{create_manual_poller_config, create_test_redb};

fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

#[tokio::test]
async fn test_sweep_records_available_timed_out_and_drops_failed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let fast = format!("{}/fast", mock_server.uri());
    let slow = format!("{}/slow", mock_server.uri());
    let refused = refused_url();

    let (_dir, storage) = create_test_redb();
    let storage: Arc<dyn StorageBackend> = Arc::new(storage);

    let poller = Poller::with_http(
        create_manual_poller_config(
            vec![fast.clone(), slow.clone(), refused.clone()],
            Duration::from_millis(200),
        ),
        storage.clone(),
    )
    .unwrap()
    .start();

    poller.tick_now().await.unwrap();
    let stats = poller.stop().await.unwrap();

    assert_eq!(stats.ticks, 1);
    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.persisted, 2);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.write_failures, 0);

    assert!(storage.get_last_latency(&fast).await.unwrap() > 0);
    assert_eq!(storage.get_last_latency(&slow).await.unwrap(), -1);

    // the connection error left no trace at all
    assert_eq!(storage.history_len(&refused).await.unwrap(), 0);
    assert_matches!(
        storage.get_last_latency(&refused).await,
        Err(StorageError::NotFound(_))
    );

    let query = QueryFacade::new(storage.clone());
    let fast_info = query.get_url_info(&fast).await.unwrap();
    assert!(fast_info.is_available);
    assert!(fast_info.avg_latency_ns > 0);
    assert_eq!(query.get_url_info(&slow).await.unwrap(), UrlInfo::default());
    assert_eq!(query.get_min_latency().await.unwrap().url, fast);
}

#[tokio::test]
async fn test_stop_drains_every_dispatched_probe() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(100)))
        .mount(&mock_server)
        .await;

    let urls: Vec<String> = (0..6)
        .map(|i| format!("{}/site/{i}", mock_server.uri()))
        .collect();

    let storage = Arc::new(MemoryBackend::new());
    let poller = Poller::with_http(
        create_manual_poller_config(urls.clone(), Duration::from_secs(2)),
        storage.clone(),
    )
    .unwrap()
    .start();

    poller.tick_now().await.unwrap();
    poller.tick_now().await.unwrap();
    let stats = poller.stop().await.unwrap();

    assert_eq!(stats.dispatched, 12);
    assert_eq!(stats.persisted, 12);
    for url in &urls {
        assert_eq!(storage.history_len(url).await.unwrap(), 2);
    }
}

#[tokio::test]
async fn test_poller_state_transitions() {
    let storage = Arc::new(MemoryBackend::new());
    let poller = Poller::with_http(
        create_manual_poller_config(vec![], Duration::from_secs(1)),
        storage,
    )
    .unwrap()
    .start();

    let monitor = poller.monitor();
    tokio::time::timeout(Duration::from_secs(1), async {
        while monitor.state() != PollerState::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let stats = poller.stop().await.unwrap();
    assert_eq!(stats.ticks, 0);
    assert_eq!(monitor.state(), PollerState::Stopped);
}
