//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to the poller via mpsc
//! 2. **Acknowledgements**: oneshot channels carry the answer back to the caller
//! 3. **State**: lifecycle changes are published on a watch channel

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Commands that can be sent to the PollerActor
#[derive(Debug)]
pub enum PollerCommand {
    /// Dispatch one sweep over all endpoints immediately (bypassing the timer)
    ///
    /// Answered once every endpoint of the sweep has been handed to a probe
    /// worker, not when the probes finish.
    TickNow { respond_to: oneshot::Sender<()> },

    /// Stop the poller
    ///
    /// The actor closes the dispatch queue, waits for the probe workers, closes
    /// the results queue, waits for the persistence workers, and only then
    /// answers with the final counters.
    Stop {
        respond_to: oneshot::Sender<PollerStats>,
    },
}

/// Lifecycle of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollerState::Idle => write!(f, "idle"),
            PollerState::Running => write!(f, "running"),
            PollerState::Stopping => write!(f, "stopping"),
            PollerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Poller statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerStats {
    /// Sweeps started (timer ticks and TickNow commands)
    pub ticks: u64,

    /// Endpoints handed to probe workers
    pub dispatched: u64,

    /// Probe results written to storage
    pub persisted: u64,

    /// Probes dropped because of non-timeout transport errors
    pub dropped: u64,

    /// Probe results whose storage write failed
    pub write_failures: u64,
}

/// Live counters shared between the scheduling loop and the workers
#[derive(Debug, Default)]
pub(crate) struct PollerCounters {
    pub ticks: AtomicU64,
    pub dispatched: AtomicU64,
    pub persisted: AtomicU64,
    pub dropped: AtomicU64,
    pub write_failures: AtomicU64,
}

impl PollerCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PollerStats {
        PollerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}
