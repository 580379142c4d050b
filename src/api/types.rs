//! API request and response types

use serde::{Deserialize, Serialize};

use crate::actors::messages::{PollerState, PollerStats};

pub use crate::query::{LatencyInfo, UrlInfo};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poller: Option<PollerState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PollerStats>,
}

/// Query string of `GET /api/v1/urls/info`
///
/// A missing `url` deserializes to an empty string so the handler can reject
/// it with a JSON error body.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlQuery {
    #[serde(default)]
    pub url: String,
}
