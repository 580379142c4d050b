//! Query API for the latency hub
//!
//! Thin HTTP front end over [`crate::query::QueryFacade`]. Handlers only
//! translate requests and map storage errors to status codes.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check with poller state and counters
//! - `GET /api/v1/urls/info?url=...` - Availability and last latency of one endpoint
//! - `GET /api/v1/latency/min` - Endpoint with the lowest average latency
//! - `GET /api/v1/latency/max` - Endpoint with the highest average latency

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, UrlQuery};

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "127.0.0.1:8000")
    pub bind_addr: SocketAddr,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_default_addr(),
            enable_cors: true,
        }
    }
}

/// Build the router with all routes and the tracing layer
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/urls/info", get(routes::latency::get_url_info))
        .route("/api/v1/latency/min", get(routes::latency::get_min_latency))
        .route("/api/v1/latency/max", get(routes::latency::get_max_latency))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// Starts serving in a background task and returns the bound address. The
/// server shuts down gracefully once `shutdown` resolves.
pub async fn spawn_api_server<F>(
    config: ApiConfig,
    state: ApiState,
    shutdown: F,
) -> anyhow::Result<SocketAddr>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("starting API server on {}", config.bind_addr);

    let mut app = router(state);

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
