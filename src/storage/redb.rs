//! redb storage backend implementation
//!
//! This module provides the embedded key-value implementation of the
//! `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: a single database file, no server process
//! - **Transactional**: history append and aggregate update commit together
//! - **Single writer**: redb queues write transactions, so concurrent
//!   `put_latency` calls never interleave
//! - **Snapshot reads**: readers see the last committed write and never block
//!   on the writer
//!
//! redb calls are blocking, so every operation runs on the tokio blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redb::{
    Database, ReadOnlyTable, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, TableError,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::schema::{
    AGGREGATE_TABLE, AggregateRecord, EndpointLatency, Extreme, decode_latency, decode_timestamp,
    encode_latency, encode_timestamp, history_table_name, next_history_key, select_extreme,
};

const AGGREGATES: TableDefinition<&str, &[u8]> = TableDefinition::new(AGGREGATE_TABLE);

type HistoryTable<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

/// redb storage backend
///
/// Every operation moves a read guard of the handle lock into its blocking
/// task. `close` takes the write guard, so it returns only after in-flight
/// operations finished and the database file is released.
pub struct RedbBackend {
    db: Arc<RwLock<Option<Database>>>,
    db_path: Option<PathBuf>,
}

impl RedbBackend {
    /// Open (or create) the database file at `db_path`
    ///
    /// The aggregate table is created up front; history tables are created
    /// lazily by the first write for each endpoint.
    #[instrument(skip_all)]
    pub fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        info!("opening redb store at: {}", db_path.display());

        let db = Database::create(&db_path)?;
        Self::with_database(db, Some(db_path))
    }

    /// Create an ephemeral store backed by memory (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        debug!("in-memory redb store opened");
        Self::with_database(db, None)
    }

    fn with_database(db: Database, db_path: Option<PathBuf>) -> StorageResult<Self> {
        let txn = db.begin_write()?;
        txn.open_table(AGGREGATES)?;
        txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(Some(db))),
            db_path,
        })
    }

    /// Path of the database file (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run a blocking closure against the database on the blocking pool
    async fn with_db<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StorageResult<T> + Send + 'static,
    {
        let guard = self.db.clone().read_owned().await;
        if guard.is_none() {
            return Err(StorageError::Closed);
        }
        // the guard lives inside the task, even if this future is dropped
        tokio::task::spawn_blocking(move || match guard.as_ref() {
            Some(db) => f(db),
            None => Err(StorageError::Closed),
        })
        .await?
    }
}

fn now_nanos() -> u64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0) as u64
}

fn put_latency_blocking(db: &Database, url: &str, latency: i64) -> StorageResult<u64> {
    let name = history_table_name(url);
    let history_def: HistoryTable<'_> = TableDefinition::new(&name);

    let txn = db.begin_write()?;
    let key = {
        let mut history = txn.open_table(history_def)?;
        let last_key = history
            .last()?
            .map(|(key, _)| decode_timestamp(key.value()))
            .transpose()?;
        let key = next_history_key(now_nanos(), last_key);
        history.insert(
            encode_timestamp(key).as_slice(),
            encode_latency(latency).as_slice(),
        )?;

        if latency >= 0 {
            let mut aggregates = txn.open_table(AGGREGATES)?;
            let existing = aggregates
                .get(url)?
                .map(|bytes| AggregateRecord::from_bytes(bytes.value()))
                .transpose()?;
            let updated = AggregateRecord::apply(existing, latency)?;
            aggregates.insert(url, updated.to_bytes()?.as_slice())?;
        }
        key
    };
    // Dropping an uncommitted transaction aborts it, so early returns above
    // leave neither the history entry nor the aggregate behind.
    txn.commit()?;

    Ok(key)
}

fn open_history<'a>(
    db: &Database,
    name: &'a str,
) -> StorageResult<Option<ReadOnlyTable<&'static [u8], &'static [u8]>>> {
    let txn = db.begin_read()?;
    let history_def: HistoryTable<'a> = TableDefinition::new(name);
    match txn.open_table(history_def) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn scan_extreme(db: &Database, extreme: Extreme) -> StorageResult<EndpointLatency> {
    let txn = db.begin_read()?;
    let aggregates = txn.open_table(AGGREGATES)?;
    let records = aggregates.iter()?.map(|entry| {
        let (url, bytes) = entry?;
        Ok((
            url.value().to_string(),
            AggregateRecord::from_bytes(bytes.value())?,
        ))
    });
    select_extreme(records, extreme)
}

#[async_trait]
impl StorageBackend for RedbBackend {
    #[instrument(skip(self))]
    async fn put_latency(&self, url: &str, latency: i64) -> StorageResult<()> {
        let url = url.to_string();
        let key = self
            .with_db(move |db| put_latency_blocking(db, &url, latency))
            .await?;
        debug!(key, "latency stored");
        Ok(())
    }

    async fn get_last_latency(&self, url: &str) -> StorageResult<i64> {
        let url = url.to_string();
        self.with_db(move |db| {
            let name = history_table_name(&url);
            let history = open_history(db, &name)?
                .ok_or_else(|| StorageError::NotFound(url.clone()))?;
            let last = history
                .last()?
                .map(|(_, latency)| decode_latency(latency.value()));
            last.unwrap_or_else(|| Err(StorageError::NotFound(format!("history of {url}"))))
        })
        .await
    }

    async fn get_avg_latency(&self, url: &str) -> StorageResult<i64> {
        let url = url.to_string();
        self.with_db(move |db| {
            let txn = db.begin_read()?;
            let aggregates = txn.open_table(AGGREGATES)?;
            let record = aggregates
                .get(url.as_str())?
                .map(|bytes| AggregateRecord::from_bytes(bytes.value()))
                .transpose()?
                .ok_or_else(|| StorageError::NotFound(url.clone()))?;
            Ok(record.avg)
        })
        .await
    }

    async fn get_min_latency(&self) -> StorageResult<EndpointLatency> {
        self.with_db(|db| scan_extreme(db, Extreme::Min)).await
    }

    async fn get_max_latency(&self) -> StorageResult<EndpointLatency> {
        self.with_db(|db| scan_extreme(db, Extreme::Max)).await
    }

    async fn history_len(&self, url: &str) -> StorageResult<u64> {
        let url = url.to_string();
        self.with_db(move |db| {
            let name = history_table_name(&url);
            match open_history(db, &name)? {
                Some(history) => Ok(history.len()?),
                None => Ok(0),
            }
        })
        .await
    }

    async fn close(&self) -> StorageResult<()> {
        let db = self.db.write().await.take();
        match db {
            Some(_) => info!("redb store closed"),
            None => debug!("redb store already closed"),
        }
        Ok(())
    }
}
