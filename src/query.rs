//! Read-only query facade over the latency store
//!
//! Transport independent: the HTTP API and any other front end call these
//! methods and only translate their results. Storage errors, including
//! not-found, propagate to the caller unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{EndpointLatency, StorageBackend, StorageResult};

/// Availability of a single endpoint
///
/// `avg_latency_ns` carries the LAST recorded latency and is only populated
/// when that probe succeeded; an endpoint whose last probe timed out reports
/// `is_available = false` and `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlInfo {
    pub is_available: bool,
    pub avg_latency_ns: i64,
}

/// An endpoint and its average latency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyInfo {
    pub url: String,
    pub avg_latency_ns: i64,
}

impl From<EndpointLatency> for LatencyInfo {
    fn from(value: EndpointLatency) -> Self {
        Self {
            url: value.url,
            avg_latency_ns: value.avg_latency_ns,
        }
    }
}

/// Query operations backed 1:1 by storage reads
#[derive(Clone)]
pub struct QueryFacade {
    storage: Arc<dyn StorageBackend>,
}

impl QueryFacade {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub async fn get_url_info(&self, url: &str) -> StorageResult<UrlInfo> {
        let latency = self
            .storage
            .get_last_latency(url)
            .await
            .inspect_err(|e| warn!("storage error: {e}"))?;

        if latency >= 0 {
            Ok(UrlInfo {
                is_available: true,
                avg_latency_ns: latency,
            })
        } else {
            Ok(UrlInfo::default())
        }
    }

    pub async fn get_min_latency(&self) -> StorageResult<LatencyInfo> {
        self.storage
            .get_min_latency()
            .await
            .map(LatencyInfo::from)
            .inspect_err(|e| warn!("storage error: {e}"))
    }

    pub async fn get_max_latency(&self) -> StorageResult<LatencyInfo> {
        self.storage
            .get_max_latency()
            .await
            .map(LatencyInfo::from)
            .inspect_err(|e| warn!("storage error: {e}"))
    }
}
