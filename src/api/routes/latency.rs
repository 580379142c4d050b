//! Latency query endpoints

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{LatencyInfo, UrlInfo, UrlQuery},
};

/// GET /api/v1/urls/info?url=...
///
/// Availability of one endpoint and its last latency. Unknown endpoints
/// yield 404.
#[instrument(skip(state))]
pub async fn get_url_info(
    State(state): State<ApiState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<UrlInfo>> {
    if query.url.is_empty() {
        return Err(ApiError::InvalidRequest("url must not be empty".to_string()));
    }

    let info = state.query.get_url_info(&query.url).await?;
    Ok(Json(info))
}

/// GET /api/v1/latency/min
pub async fn get_min_latency(State(state): State<ApiState>) -> ApiResult<Json<LatencyInfo>> {
    Ok(Json(state.query.get_min_latency().await?))
}

/// GET /api/v1/latency/max
pub async fn get_max_latency(State(state): State<ApiState>) -> ApiResult<Json<LatencyInfo>> {
    Ok(Json(state.query.get_max_latency().await?))
}
