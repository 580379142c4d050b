//! In-memory storage backend (no persistence)
//!
//! This backend keeps history and aggregates in ordered maps behind an async
//! lock. It's useful for:
//! - Testing the poller and query layers without touching disk
//! - Running the hub without a database file
//!
//! It follows the same contract as the redb backend: identical not-found
//! behavior, lexicographic tie-breaking and the zero value for min/max on an
//! empty store.
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::schema::{AggregateRecord, EndpointLatency, Extreme, next_history_key, select_extreme};

#[derive(Debug, Default)]
struct MemoryState {
    /// Timestamp-keyed latencies grouped by endpoint
    history: BTreeMap<String, BTreeMap<u64, i64>>,

    /// Aggregates keyed by endpoint (ordered like the redb table)
    aggregates: BTreeMap<String, AggregateRecord>,

    closed: bool,
}

impl MemoryState {
    fn check_open(&self) -> StorageResult<()> {
        if self.closed {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Full history of an endpoint in chronological order
    pub async fn history(&self, url: &str) -> Vec<(u64, i64)> {
        let state = self.state.read().await;
        state
            .history
            .get(url)
            .map(|entries| entries.iter().map(|(ts, lat)| (*ts, *lat)).collect())
            .unwrap_or_default()
    }

    /// Aggregate record of an endpoint, if any
    pub async fn aggregate(&self, url: &str) -> Option<AggregateRecord> {
        self.state.read().await.aggregates.get(url).copied()
    }

    async fn scan(&self, extreme: Extreme) -> StorageResult<EndpointLatency> {
        let state = self.state.read().await;
        state.check_open()?;
        let records = state
            .aggregates
            .iter()
            .map(|(url, record)| Ok((url.clone(), *record)));
        select_extreme(records, extreme)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put_latency(&self, url: &str, latency: i64) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.check_open()?;

        // compute the aggregate first so a failure leaves no history entry behind
        let aggregate = if latency >= 0 {
            Some(AggregateRecord::apply(
                state.aggregates.get(url).copied(),
                latency,
            )?)
        } else {
            None
        };

        let now = Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0) as u64;
        let entries = state.history.entry(url.to_string()).or_default();
        let key = next_history_key(now, entries.keys().next_back().copied());
        entries.insert(key, latency);

        if let Some(aggregate) = aggregate {
            state.aggregates.insert(url.to_string(), aggregate);
        }

        debug!(url, latency, key, "latency stored in memory");
        Ok(())
    }

    async fn get_last_latency(&self, url: &str) -> StorageResult<i64> {
        let state = self.state.read().await;
        state.check_open()?;
        state
            .history
            .get(url)
            .and_then(|entries| entries.values().next_back().copied())
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }

    async fn get_avg_latency(&self, url: &str) -> StorageResult<i64> {
        let state = self.state.read().await;
        state.check_open()?;
        state
            .aggregates
            .get(url)
            .map(|record| record.avg)
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }

    async fn get_min_latency(&self) -> StorageResult<EndpointLatency> {
        self.scan(Extreme::Min).await
    }

    async fn get_max_latency(&self) -> StorageResult<EndpointLatency> {
        self.scan(Extreme::Max).await
    }

    async fn history_len(&self, url: &str) -> StorageResult<u64> {
        let state = self.state.read().await;
        state.check_open()?;
        Ok(state
            .history
            .get(url)
            .map(|entries| entries.len() as u64)
            .unwrap_or_default())
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend");
        self.state.write().await.closed = true;
        Ok(())
    }
}
