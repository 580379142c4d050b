use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use latency_monitor::{
    actors::poller::{Poller, PollerConfig, shutdown},
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, ResolvedConfig, StorageConfig, read_config_file},
    endpoints::read_urls,
    query::QueryFacade,
    storage::{MemoryBackend, RedbBackend, StorageBackend},
};
use tokio::sync::oneshot;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// File with one endpoint per line
    #[arg(long)]
    sites: Option<PathBuf>,

    /// Poll interval, e.g. "10s"
    #[arg(long)]
    interval: Option<String>,

    /// Deadline of a single probe, e.g. "2s"
    #[arg(long)]
    timeout: Option<String>,

    /// Bind address of the query API
    #[arg(long)]
    address: Option<SocketAddr>,

    /// Path of the latency database
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Size of each worker pool
    #[arg(long)]
    workers: Option<usize>,

    /// JSON config file; command line flags take precedence
    #[arg(short, long)]
    config: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let file = match &self.config {
            Some(path) => read_config_file(path)?,
            None => Config::default(),
        };

        let cli = Config {
            sites: self.sites,
            interval: self.interval,
            timeout: self.timeout,
            address: self.address,
            workers: self.workers,
            storage: self.db_path.map(|path| StorageConfig::Redb { path }),
        };

        Ok(file.merge(cli))
    }
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("latency_monitor", LevelFilter::DEBUG),
        ("hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn open_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory storage, nothing is persisted");
            Ok(Arc::new(MemoryBackend::new()))
        }
        StorageConfig::Redb { path } => {
            info!("opening latency database at {}", path.display());
            let backend = RedbBackend::new(path)
                .with_context(|| format!("can't open database {}", path.display()))?;
            Ok(Arc::new(backend))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let ResolvedConfig {
        sites,
        interval,
        timeout,
        address,
        workers,
        storage,
    } = args.into_config()?.resolve()?;

    let urls = read_urls(&sites)?;
    let storage = open_storage(&storage)?;

    let poller = Poller::with_http(
        PollerConfig {
            urls,
            interval,
            timeout,
            workers,
        },
        storage.clone(),
    )?
    .start();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let state = ApiState::new(QueryFacade::new(storage.clone())).with_poller(poller.monitor());
    let api_config = ApiConfig {
        bind_addr: address,
        enable_cors: true,
    };
    let served = spawn_api_server(api_config, state, async {
        shutdown_rx.await.ok();
    })
    .await
    .with_context(|| format!("can't serve on {address}"));

    if served.is_ok() {
        shutdown_signal().await;
    }

    shutdown_tx.send(()).ok();

    // runs when the API never came up, too
    match shutdown(poller, storage.as_ref()).await {
        Ok(stats) => info!(
            "poller stopped after {} ticks: {} persisted, {} dropped, {} write failures",
            stats.ticks, stats.persisted, stats.dropped, stats.write_failures
        ),
        Err(e) => error!("failed to stop poller: {e}"),
    }

    served.map(|_| ())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
