use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use latency_monitor::{
    endpoints::read_urls,
    query::{LatencyInfo, UrlInfo},
    util::{get_default_addr, nanos_to_millis},
};
use serde::de::DeserializeOwned;
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// File with one endpoint per line
    #[arg(long, default_value = "sites.txt")]
    sites: PathBuf,

    /// Base URL of the hub, defaults to http://<LATENCY_HUB_ADDR>
    #[arg(long)]
    hub: Option<String>,

    /// Deadline for the whole session, in seconds
    #[arg(long, default_value_t = 20)]
    deadline: u64,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("latency_monitor", LevelFilter::INFO),
        ("client", LevelFilter::TRACE),
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

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> anyhow::Result<T> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{status}: {body}");
    }
    Ok(response.json::<T>().await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let hub = args
        .hub
        .unwrap_or_else(|| format!("http://{}", get_default_addr()));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.deadline))
        .build()
        .context("can't build http client")?;

    let urls = read_urls(&args.sites)?;

    for url in &urls {
        match get_json::<UrlInfo>(&client, &format!("{hub}/api/v1/urls/info"), &[("url", url)]).await
        {
            Ok(info) => info!(
                "{url}: response: {info:?} ms: {}",
                nanos_to_millis(info.avg_latency_ns)
            ),
            Err(e) => warn!("{url}: error: {e}"),
        }
    }

    for (name, path) in [
        ("GetMinLatency", "/api/v1/latency/min"),
        ("GetMaxLatency", "/api/v1/latency/max"),
    ] {
        match get_json::<LatencyInfo>(&client, &format!("{hub}{path}"), &[]).await {
            Ok(info) => info!(
                "{name}: response: {info:?} ms: {}",
                nanos_to_millis(info.avg_latency_ns)
            ),
            Err(e) => warn!("{name}: error: {e}"),
        }
    }

    Ok(())
}
