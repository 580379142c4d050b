//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::EndpointLatency;

/// Trait for latency storage backends
///
/// The embedded redb backend is the production implementation; the in-memory
/// backend satisfies the same contract for tests that don't need persistence.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: every persistence worker of the
/// poller and every query caller share one backend through an `Arc`. Writes are
/// serialized by the backend itself, callers never coordinate.
///
/// ## Error Handling
///
/// Lookups of endpoints without data fail with `StorageError::NotFound`.
/// Once `close` has been called, every method fails with `StorageError::Closed`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Record one probe result
    ///
    /// Within a single transaction this appends a history entry keyed by the
    /// current timestamp and, if `latency >= 0`, folds the latency into the
    /// endpoint's aggregate. Either both effects commit or neither does.
    async fn put_latency(&self, url: &str, latency: i64) -> StorageResult<()>;

    /// Latency of the newest history entry for an endpoint
    ///
    /// May be `-1` if the last probe timed out.
    async fn get_last_latency(&self, url: &str) -> StorageResult<i64>;

    /// Current running average of the available probes of an endpoint
    async fn get_avg_latency(&self, url: &str) -> StorageResult<i64>;

    /// Endpoint with the lowest average latency
    ///
    /// Ties go to the lexicographically first endpoint. With no aggregates at
    /// all this returns the zero value rather than an error.
    async fn get_min_latency(&self) -> StorageResult<EndpointLatency>;

    /// Endpoint with the highest average latency
    ///
    /// Same tie and empty-store rules as `get_min_latency`.
    async fn get_max_latency(&self) -> StorageResult<EndpointLatency>;

    /// Number of history entries recorded for an endpoint (0 if none)
    async fn history_len(&self, url: &str) -> StorageResult<u64>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
