//! Storage backends for latency persistence
//!
//! This module provides a trait-based abstraction over the store that keeps
//! the per-endpoint latency history and the running averages.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` trait allows swapping implementations
//! - **Async**: All operations are async for compatibility with the Tokio poller
//! - **Transactional**: history and aggregate are updated in one commit
//!
//! ## Backends
//!
//! - **redb** (default): Embedded key-value database, one file on disk
//! - **In-Memory**: No persistence, for testing
//!
//! ## Usage
//!
//! ```no_run
//! use latency_monitor::storage::{RedbBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = RedbBackend::new("./latency.db")?;
//!     backend.put_latency("https://example.com", 120_000_000).await?;
//!     backend.close().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod redb;
pub mod schema;

pub use self::redb::RedbBackend;
pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::{AggregateRecord, EndpointLatency, UNAVAILABLE_LATENCY};
