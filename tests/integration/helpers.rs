//! Helper functions for integration tests

use std::sync::Arc;
use std::time::Duration;

use latency_monitor::actors::poller::PollerConfig;
use latency_monitor::storage::{MemoryBackend, RedbBackend, StorageBackend};
use tempfile::TempDir;

/// On-disk redb store inside a fresh temporary directory
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn create_test_redb() -> (TempDir, RedbBackend) {
    let dir = tempfile::tempdir().unwrap();
    let backend = RedbBackend::new(dir.path().join("latency.db")).unwrap();
    (dir, backend)
}

/// In-memory store preloaded with `(url, latency)` writes, in order
pub async fn create_seeded_memory(data: &[(&str, i64)]) -> Arc<MemoryBackend> {
    let storage = Arc::new(MemoryBackend::new());
    seed(storage.as_ref(), data).await;
    storage
}

pub async fn seed(storage: &dyn StorageBackend, data: &[(&str, i64)]) {
    for (url, latency) in data {
        storage.put_latency(url, *latency).await.unwrap();
    }
}

/// Poller config whose timer never fires during a test
pub fn create_manual_poller_config(urls: Vec<String>, timeout: Duration) -> PollerConfig {
    PollerConfig {
        urls,
        interval: Duration::from_secs(3600),
        timeout,
        workers: 2,
    }
}
