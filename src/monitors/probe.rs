//! HTTP availability probes
//!
//! A probe issues a single `HEAD` request with an absolute deadline and
//! measures how long it took. Redirects are not followed: a 3xx answer is a
//! completed response like any other status code.
//!
//! ## Outcomes
//!
//! - **Completed**: any response arrived in time, latency is the elapsed time
//! - **TimedOut**: the deadline passed, recorded as unavailable (`-1`)
//! - **Failed**: DNS, connect, TLS and other transport errors; the poller drops
//!   these without recording anything

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{instrument, trace};

/// Result of probing an endpoint once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered; elapsed time in nanoseconds
    Completed { latency_ns: i64 },

    /// The endpoint did not answer before the deadline
    TimedOut,

    /// The request failed for a reason other than the deadline
    Failed(String),
}

/// Something that can check an endpoint
///
/// The poller only talks to endpoints through this trait so tests can swap in
/// scripted probers.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// `HEAD` prober backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpProber {
    /// HTTP client (reused across requests for efficiency)
    client: reqwest::Client,
}

impl HttpProber {
    /// Build a prober whose requests are cut off after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();

        match self.client.head(url).send().await {
            Ok(response) => {
                let latency_ns = i64::try_from(start.elapsed().as_nanos()).unwrap_or(i64::MAX);
                trace!(status = %response.status(), latency_ns, "probe completed");
                ProbeOutcome::Completed { latency_ns }
            }
            Err(e) if e.is_timeout() => {
                trace!("probe timed out");
                ProbeOutcome::TimedOut
            }
            Err(e) => ProbeOutcome::Failed(e.to_string()),
        }
    }
}
