pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod endpoints;
pub mod monitors;
pub mod query;
pub mod storage;
pub mod util;

use serde::{Deserialize, Serialize};

use crate::monitors::probe::ProbeOutcome;
use crate::storage::UNAVAILABLE_LATENCY;

/// Result of one completed probe, as handed from probe to persistence workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub available: bool,

    /// Elapsed time in nanoseconds; meaningless when `available` is false
    pub latency: i64,
}

impl ProbeResult {
    /// Turn a probe outcome into a result worth persisting
    ///
    /// Timeouts become unavailable results; other transport failures yield
    /// nothing at all.
    pub fn from_outcome(url: String, outcome: ProbeOutcome) -> Option<Self> {
        match outcome {
            ProbeOutcome::Completed { latency_ns } => Some(Self {
                url,
                available: true,
                latency: latency_ns,
            }),
            ProbeOutcome::TimedOut => Some(Self {
                url,
                available: false,
                latency: UNAVAILABLE_LATENCY,
            }),
            ProbeOutcome::Failed(_) => None,
        }
    }

    /// Latency as written to storage (`-1` for unavailable)
    pub fn recorded_latency(&self) -> i64 {
        if self.available {
            self.latency
        } else {
            UNAVAILABLE_LATENCY
        }
    }
}
