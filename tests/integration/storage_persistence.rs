//! Integration tests for the redb store
//!
//! These tests verify that:
//! - History is append-only and survives a reopen
//! - Aggregates only count available probes
//! - Min/max selection and its tie rules
//! - Concurrent writers never lose an update

use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;
use latency_monitor::storage::{EndpointLatency, RedbBackend, StorageBackend, StorageError};
use pretty_assertions::assert_eq;

use crate::helpers::{create_test_redb, seed};

#[tokio::test]
async fn test_data_survives_reopen() {
    let (dir, storage) = create_test_redb();
    seed(&storage, &[("https://a", 100), ("https://a", 300), ("https://b", -1)]).await;
    storage.close().await.unwrap();

    let reopened = RedbBackend::new(dir.path().join("latency.db")).unwrap();
    assert_eq!(reopened.history_len("https://a").await.unwrap(), 2);
    assert_eq!(reopened.get_avg_latency("https://a").await.unwrap(), 200);
    assert_eq!(reopened.get_last_latency("https://b").await.unwrap(), -1);

    reopened.put_latency("https://a", 500).await.unwrap();
    assert_eq!(reopened.history_len("https://a").await.unwrap(), 3);
    assert_eq!(reopened.get_avg_latency("https://a").await.unwrap(), 300);
    assert_eq!(reopened.get_last_latency("https://a").await.unwrap(), 500);
}

#[tokio::test]
async fn test_unavailable_entries_only_touch_history() {
    let (_dir, storage) = create_test_redb();
    seed(
        &storage,
        &[("https://a", -1), ("https://a", 40), ("https://a", -1), ("https://a", 60)],
    )
    .await;

    assert_eq!(storage.history_len("https://a").await.unwrap(), 4);
    assert_eq!(storage.get_avg_latency("https://a").await.unwrap(), 50);
    assert_eq!(storage.get_last_latency("https://a").await.unwrap(), 60);
}

#[tokio::test]
async fn test_endpoint_without_available_probe_has_no_average() {
    let (_dir, storage) = create_test_redb();
    seed(&storage, &[("https://down", -1)]).await;

    assert_eq!(storage.get_last_latency("https://down").await.unwrap(), -1);
    assert_matches!(
        storage.get_avg_latency("https://down").await,
        Err(StorageError::NotFound(_))
    );
}

#[tokio::test]
async fn test_average_uses_integer_division() {
    let (_dir, storage) = create_test_redb();
    seed(&storage, &[("https://a", 1), ("https://a", 2)]).await;

    assert_eq!(storage.get_avg_latency("https://a").await.unwrap(), 1);
}

#[tokio::test]
async fn test_min_max_over_many_endpoints() {
    let (_dir, storage) = create_test_redb();
    seed(
        &storage,
        &[
            ("https://google.com", 40),
            ("https://ya.ru", 10),
            ("https://mail.ru", 90),
            ("https://ya.ru", 30),
            ("https://notexist.eu", -1),
        ],
    )
    .await;

    assert_eq!(
        storage.get_min_latency().await.unwrap(),
        EndpointLatency {
            url: "https://ya.ru".to_string(),
            avg_latency_ns: 20
        }
    );
    assert_eq!(
        storage.get_max_latency().await.unwrap(),
        EndpointLatency {
            url: "https://mail.ru".to_string(),
            avg_latency_ns: 90
        }
    );
}

#[tokio::test]
async fn test_ties_go_to_first_endpoint_in_key_order() {
    let (_dir, storage) = create_test_redb();
    // insertion order deliberately differs from key order
    seed(&storage, &[("https://c", 50), ("https://a", 50), ("https://b", 50)]).await;

    assert_eq!(storage.get_min_latency().await.unwrap().url, "https://a");
    assert_eq!(storage.get_max_latency().await.unwrap().url, "https://a");
}

#[tokio::test]
async fn test_empty_store_yields_zero_value() {
    let (_dir, storage) = create_test_redb();

    assert_eq!(storage.get_min_latency().await.unwrap(), EndpointLatency::default());
    assert_eq!(storage.get_max_latency().await.unwrap(), EndpointLatency::default());
    assert_eq!(storage.history_len("https://a").await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_writers_keep_aggregate_consistent() {
    let (_dir, storage) = create_test_redb();
    let storage = Arc::new(storage);

    let writes = (1..=50i64).map(|latency| {
        let storage = storage.clone();
        async move { storage.put_latency("https://a", latency).await }
    });
    for result in join_all(writes).await {
        result.unwrap();
    }

    // sum(1..=50) = 1275, 1275 / 50 = 25
    assert_eq!(storage.history_len("https://a").await.unwrap(), 50);
    assert_eq!(storage.get_avg_latency("https://a").await.unwrap(), 25);
}

#[tokio::test]
async fn test_operations_fail_after_close() {
    let (_dir, storage) = create_test_redb();
    seed(&storage, &[("https://a", 1)]).await;
    storage.close().await.unwrap();

    assert_matches!(storage.put_latency("https://a", 2).await, Err(StorageError::Closed));
    assert_matches!(storage.get_last_latency("https://a").await, Err(StorageError::Closed));
    assert_matches!(storage.get_min_latency().await, Err(StorageError::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_waits_for_in_flight_writes() {
    let (dir, storage) = create_test_redb();
    let storage = Arc::new(storage);

    let writers: Vec<_> = (0..32i64)
        .map(|latency| {
            let storage = storage.clone();
            tokio::spawn(async move { storage.put_latency("https://a", latency).await })
        })
        .collect();

    storage.close().await.unwrap();

    // the file lock is released as soon as close returns
    let reopened = RedbBackend::new(dir.path().join("latency.db")).unwrap();

    let mut written = 0;
    for writer in join_all(writers).await {
        match writer.unwrap() {
            Ok(()) => written += 1,
            Err(e) => assert_matches!(e, StorageError::Closed),
        }
    }
    assert_eq!(reopened.history_len("https://a").await.unwrap(), written);
}
