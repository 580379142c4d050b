use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// Embedded redb database (default)
    Redb {
        /// Path to the database file
        #[serde(default = "default_db_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Redb {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./latency.db")
}

fn default_sites() -> PathBuf {
    PathBuf::from("sites.txt")
}

/// Hub configuration as read from a file or the command line
///
/// Every field is optional; `merge` layers command line values over file
/// values and `resolve` fills in defaults.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// File with one endpoint per line
    pub sites: Option<PathBuf>,

    /// Poll interval, e.g. "10s" or "1m30s"
    pub interval: Option<String>,

    /// Deadline of a single probe, e.g. "2s"
    pub timeout: Option<String>,

    /// Bind address of the query API
    pub address: Option<SocketAddr>,

    /// Size of each worker pool
    pub workers: Option<usize>,

    pub storage: Option<StorageConfig>,
}

impl Config {
    /// Overlay `other` on top of `self`; set fields of `other` win
    pub fn merge(self, other: Config) -> Config {
        Config {
            sites: other.sites.or(self.sites),
            interval: other.interval.or(self.interval),
            timeout: other.timeout.or(self.timeout),
            address: other.address.or(self.address),
            workers: other.workers.or(self.workers),
            storage: other.storage.or(self.storage),
        }
    }

    /// Apply defaults and validate
    pub fn resolve(self) -> Result<ResolvedConfig> {
        let interval_str = self.interval.unwrap_or_else(crate::util::get_default_interval);
        let interval = parse_duration(&interval_str)
            .with_context(|| format!("bad interval param: {interval_str:?}"))?;
        if interval.is_zero() {
            bail!("bad interval param: {interval_str:?} must be greater than zero");
        }

        let timeout_str = self.timeout.unwrap_or_else(crate::util::get_default_timeout);
        let timeout = parse_duration(&timeout_str)
            .with_context(|| format!("bad timeout param: {timeout_str:?}"))?;
        if timeout.is_zero() {
            bail!("bad timeout param: {timeout_str:?} must be greater than zero");
        }

        let workers = self.workers.unwrap_or_else(crate::util::get_default_workers);
        if workers == 0 {
            bail!("workers must be at least 1");
        }

        Ok(ResolvedConfig {
            sites: self.sites.unwrap_or_else(default_sites),
            interval,
            timeout,
            address: self.address.unwrap_or_else(crate::util::get_default_addr),
            workers,
            storage: self.storage.unwrap_or_default(),
        })
    }
}

/// Fully resolved hub configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub sites: PathBuf,
    pub interval: Duration,
    pub timeout: Duration,
    pub address: SocketAddr,
    pub workers: usize,
    pub storage: StorageConfig,
}

pub fn read_config_file(path: &str) -> Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Parse a duration such as "300ms", "10s", "1m30s" or "1.5h"
///
/// A duration is a sequence of decimal numbers, each followed by one of the
/// units `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. Signs are not accepted.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total_nanos = 0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if number_len == 0 {
            bail!("invalid duration {input:?}");
        }
        let value: f64 = rest[..number_len]
            .parse()
            .with_context(|| format!("invalid number in duration {input:?}"))?;
        rest = &rest[number_len..];

        let unit_len = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => bail!("missing unit in duration {input:?}"),
            unit => bail!("unknown unit {unit:?} in duration {input:?}"),
        };
        rest = &rest[unit_len..];

        total_nanos += value * scale;
    }

    if total_nanos > u64::MAX as f64 {
        bail!("duration {input:?} out of range");
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
