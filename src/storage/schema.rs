//! Persisted layout and record types
//!
//! ## Layout
//!
//! The store keeps two namespaces:
//!
//! ### History (one table per endpoint)
//! `latency:<endpoint>` maps the probe completion timestamp to the recorded
//! latency. Both key and value are 8-byte big-endian integers, so keys sort
//! chronologically and the unavailable sentinel `-1` is stored as its
//! two's-complement bit pattern. Entries are only ever appended.
//!
//! ### Aggregates (single table)
//! `avg_latency` maps the endpoint to a JSON `{count, sum, avg}` record covering
//! available probes only. The record is rewritten in the same transaction as the
//! history append, so the triple never drifts from the history.

use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};

/// Name of the table holding one aggregate record per endpoint
pub const AGGREGATE_TABLE: &str = "avg_latency";

/// Prefix of the per-endpoint history tables
pub const HISTORY_TABLE_PREFIX: &str = "latency:";

/// Latency recorded for a probe that timed out
pub const UNAVAILABLE_LATENCY: i64 = -1;

/// Name of the history table for an endpoint
pub fn history_table_name(url: &str) -> String {
    format!("{HISTORY_TABLE_PREFIX}{url}")
}

/// Encode a timestamp key (nanoseconds since epoch) as 8 big-endian bytes
pub fn encode_timestamp(timestamp_ns: u64) -> [u8; 8] {
    timestamp_ns.to_be_bytes()
}

pub fn decode_timestamp(bytes: &[u8]) -> StorageResult<u64> {
    Ok(u64::from_be_bytes(fixed_width(bytes, "timestamp")?))
}

/// Encode a latency value as 8 big-endian bytes (`-1` keeps its bit pattern)
pub fn encode_latency(latency: i64) -> [u8; 8] {
    latency.to_be_bytes()
}

pub fn decode_latency(bytes: &[u8]) -> StorageResult<i64> {
    Ok(i64::from_be_bytes(fixed_width(bytes, "latency")?))
}

fn fixed_width(bytes: &[u8], what: &str) -> StorageResult<[u8; 8]> {
    <[u8; 8]>::try_from(bytes).map_err(|_| {
        StorageError::SerializationError(format!(
            "{what} must be 8 bytes, got {}",
            bytes.len()
        ))
    })
}

/// Pick the key for a new history entry
///
/// The clock reading is used unless it does not advance past the newest key
/// already stored for the endpoint, in which case the entry goes right after it.
pub fn next_history_key(now_ns: u64, last_key: Option<u64>) -> u64 {
    match last_key {
        Some(last) if now_ns <= last => last.saturating_add(1),
        _ => now_ns,
    }
}

/// Running aggregate over the available probes of one endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub count: i64,
    pub sum: i64,
    pub avg: i64,
}

impl AggregateRecord {
    /// Aggregate seeded with a single latency
    pub fn first(latency: i64) -> Self {
        Self {
            count: 1,
            sum: latency,
            avg: latency,
        }
    }

    /// Fold one more available latency into the aggregate
    ///
    /// `avg` is integer division of `sum` by `count`, truncating toward zero.
    pub fn record(self, latency: i64) -> StorageResult<Self> {
        let count = self.count + 1;
        let sum = self.sum.checked_add(latency).ok_or_else(|| {
            StorageError::BackendError(format!(
                "latency sum overflow ({} + {})",
                self.sum, latency
            ))
        })?;

        Ok(Self {
            count,
            sum,
            avg: sum / count,
        })
    }

    /// Apply a latency to an optional existing aggregate
    pub fn apply(existing: Option<Self>, latency: i64) -> StorageResult<Self> {
        match existing {
            Some(record) => record.record(latency),
            None => Ok(Self::first(latency)),
        }
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// An endpoint together with its average latency (nanoseconds)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointLatency {
    pub url: String,
    pub avg_latency_ns: i64,
}

/// Which extreme a scan over the aggregates looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

impl Extreme {
    fn beats(self, candidate: i64, current: i64) -> bool {
        match self {
            Extreme::Min => candidate < current,
            Extreme::Max => candidate > current,
        }
    }
}

/// Select the endpoint with the smallest or largest average
///
/// Records must arrive in key order. Only a strictly better average replaces
/// the current pick, so the first endpoint wins ties. An empty scan yields the
/// zero value.
pub fn select_extreme<I>(records: I, extreme: Extreme) -> StorageResult<EndpointLatency>
where
    I: IntoIterator<Item = StorageResult<(String, AggregateRecord)>>,
{
    let mut best: Option<EndpointLatency> = None;

    for record in records {
        let (url, aggregate) = record?;
        let replace = match &best {
            Some(current) => extreme.beats(aggregate.avg, current.avg_latency_ns),
            None => true,
        };
        if replace {
            best = Some(EndpointLatency {
                url,
                avg_latency_ns: aggregate.avg,
            });
        }
    }

    Ok(best.unwrap_or_default())
}
