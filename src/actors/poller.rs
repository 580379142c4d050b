//! PollerActor - Probes a fixed endpoint set and persists every result
//!
//! ## Pipeline
//!
//! ```text
//! Timer tick ─→ dispatch queue ─→ probe workers (N) ─→ results queue ─→ persistence workers (N) ─→ storage
//!     ↑
//!     └─── Commands (TickNow, Stop)
//! ```
//!
//! ## Backpressure
//!
//! Both queues hold a single item. On top of that, every dispatched endpoint
//! carries a permit from a semaphore with one permit per probe worker, released
//! when the probe finishes. A sweep therefore pushes the next endpoint only once
//! a probe worker is free. A sweep that is still running when the next tick
//! fires delays that tick instead of piling up work. Under sustained overload
//! consecutive sweeps merge.
//!
//! ## Shutdown
//!
//! `Stop` is only observed between sweeps. The actor then closes the dispatch
//! queue, waits for every probe worker, closes the results queue, waits for
//! every persistence worker and finally acknowledges. Nothing that was
//! dispatched is lost, and no tick fires afterwards.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use futures::future::join_all;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::ProbeResult;
use crate::monitors::probe::{HttpProber, ProbeOutcome, Prober};
use crate::storage::StorageBackend;

use super::messages::{PollerCommand, PollerCounters, PollerState, PollerStats};

/// Capacity of the dispatch and results queues
const QUEUE_CAPACITY: usize = 1;

/// An endpoint to probe, holding one probe worker slot until its probe ends
type Dispatch = (String, OwnedSemaphorePermit);

/// Static poller configuration, fixed for the lifetime of a polling session
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Endpoints probed on every tick, in this order
    pub urls: Vec<String>,

    /// Time between two sweeps
    pub interval: Duration,

    /// Deadline of a single probe
    pub timeout: Duration,

    /// Size of each of the two worker pools
    pub workers: usize,
}

impl PollerConfig {
    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("poller needs at least one worker");
        }
        if self.interval.is_zero() {
            bail!("poll interval must be greater than zero");
        }
        Ok(())
    }
}

/// A configured poller that has not been started yet
pub struct Poller {
    config: PollerConfig,
    prober: Arc<dyn Prober>,
    storage: Arc<dyn StorageBackend>,
}

impl Poller {
    /// Create a poller that probes through `prober`
    pub fn new(
        config: PollerConfig,
        prober: Arc<dyn Prober>,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            prober,
            storage,
        })
    }

    /// Create a poller that probes with `HEAD` requests
    pub fn with_http(config: PollerConfig, storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let prober = Arc::new(HttpProber::new(config.timeout)?);
        Self::new(config, prober, storage)
    }

    /// Spawn the scheduling loop and both worker pools
    pub fn start(self) -> PollerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(PollerState::Idle);
        let counters = Arc::new(PollerCounters::default());

        let actor = PollerActor {
            config: self.config,
            prober: self.prober,
            storage: self.storage,
            command_rx: cmd_rx,
            state_tx,
            counters: counters.clone(),
        };

        let task = tokio::spawn(actor.run());

        PollerHandle {
            sender: cmd_tx,
            state_rx,
            counters,
            task,
        }
    }
}

/// Actor owning the tick loop and the stop handshake
struct PollerActor {
    config: PollerConfig,
    prober: Arc<dyn Prober>,
    storage: Arc<dyn StorageBackend>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<PollerCommand>,

    /// Publishes lifecycle transitions
    state_tx: watch::Sender<PollerState>,

    counters: Arc<PollerCounters>,
}

impl PollerActor {
    #[instrument(skip(self), fields(endpoints = self.config.urls.len(), workers = self.config.workers))]
    async fn run(mut self) {
        info!("start polling with interval {:?}", self.config.interval);
        self.state_tx.send_replace(PollerState::Running);

        let (dispatch_tx, dispatch_rx) = mpsc::channel::<Dispatch>(QUEUE_CAPACITY);
        let idle_workers = Arc::new(Semaphore::new(self.config.workers));
        let (result_tx, result_rx) = mpsc::channel::<ProbeResult>(QUEUE_CAPACITY);
        let dispatch_rx = Arc::new(Mutex::new(dispatch_rx));
        let result_rx = Arc::new(Mutex::new(result_rx));

        let probe_workers: Vec<JoinHandle<()>> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(probe_worker(
                    id,
                    self.prober.clone(),
                    dispatch_rx.clone(),
                    result_tx.clone(),
                    self.counters.clone(),
                ))
            })
            .collect();

        let persist_workers: Vec<JoinHandle<()>> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(persist_worker(
                    id,
                    self.storage.clone(),
                    result_rx.clone(),
                    self.counters.clone(),
                ))
            })
            .collect();

        // like a plain ticker, the first sweep happens one interval after start
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stop_ack = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("tick");
                    self.sweep(&dispatch_tx, &idle_workers).await;
                }

                cmd = self.command_rx.recv() => match cmd {
                    Some(PollerCommand::TickNow { respond_to }) => {
                        debug!("received TickNow command");
                        self.sweep(&dispatch_tx, &idle_workers).await;
                        let _ = respond_to.send(());
                    }

                    Some(PollerCommand::Stop { respond_to }) => {
                        warn!("stop poller");
                        break Some(respond_to);
                    }

                    // every handle is gone, nobody can wait for the drain
                    None => {
                        warn!("command channel closed, stopping");
                        break None;
                    }
                }
            }
        };

        self.state_tx.send_replace(PollerState::Stopping);

        drop(dispatch_tx);
        log_join_errors("probe", join_all(probe_workers).await);

        drop(result_tx);
        log_join_errors("persistence", join_all(persist_workers).await);

        self.state_tx.send_replace(PollerState::Stopped);
        let stats = self.counters.snapshot();
        info!(?stats, "poller was stopped");

        if let Some(respond_to) = stop_ack {
            let _ = respond_to.send(stats);
        }
    }

    /// Push every endpoint onto the dispatch queue in list order, each one as
    /// soon as a probe worker is free
    async fn sweep(&self, dispatch_tx: &mpsc::Sender<Dispatch>, idle_workers: &Arc<Semaphore>) {
        PollerCounters::incr(&self.counters.ticks);

        for url in &self.config.urls {
            let Ok(permit) = idle_workers.clone().acquire_owned().await else {
                error!("worker semaphore closed, skipping rest of sweep");
                return;
            };
            if dispatch_tx.send((url.clone(), permit)).await.is_err() {
                // only possible if every probe worker died
                error!("dispatch queue closed, skipping rest of sweep");
                return;
            }
            PollerCounters::incr(&self.counters.dispatched);
        }
    }
}

#[instrument(skip_all, fields(worker = id))]
async fn probe_worker(
    id: usize,
    prober: Arc<dyn Prober>,
    dispatch_rx: Arc<Mutex<mpsc::Receiver<Dispatch>>>,
    result_tx: mpsc::Sender<ProbeResult>,
    counters: Arc<PollerCounters>,
) {
    loop {
        // the lock is only held while waiting, never while probing
        let next = dispatch_rx.lock().await.recv().await;
        let Some((url, permit)) = next else {
            break;
        };

        let outcome = prober.probe(&url).await;
        drop(permit);
        if let ProbeOutcome::Failed(reason) = &outcome {
            warn!(url = %url, "http error: {reason}");
            PollerCounters::incr(&counters.dropped);
        }

        // Failed probes yield no result
        let Some(result) = ProbeResult::from_outcome(url, outcome) else {
            continue;
        };

        if result_tx.send(result).await.is_err() {
            error!("results queue closed while probe workers are running");
            break;
        }
    }
    trace!("probe worker exited");
}

#[instrument(skip_all, fields(worker = id))]
async fn persist_worker(
    id: usize,
    storage: Arc<dyn StorageBackend>,
    result_rx: Arc<Mutex<mpsc::Receiver<ProbeResult>>>,
    counters: Arc<PollerCounters>,
) {
    loop {
        let next = result_rx.lock().await.recv().await;
        let Some(result) = next else {
            break;
        };

        trace!(?result, "save");
        match storage
            .put_latency(&result.url, result.recorded_latency())
            .await
        {
            Ok(()) => PollerCounters::incr(&counters.persisted),
            Err(e) => {
                error!(url = %result.url, "can't put latency: {e}");
                PollerCounters::incr(&counters.write_failures);
            }
        }
    }
    trace!("persistence worker exited");
}

fn log_join_errors(pool: &str, results: Vec<Result<(), tokio::task::JoinError>>) {
    for result in results {
        if let Err(e) = result {
            error!("{pool} worker panicked: {e}");
        }
    }
}

/// Handle for controlling a running poller
///
/// The handle is the only way to stop the poller. `stop` consumes it, so a
/// poller cannot be stopped twice.
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,
    state_rx: watch::Receiver<PollerState>,
    counters: Arc<PollerCounters>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Dispatch one sweep right away
    pub async fn tick_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::TickNow { respond_to: tx })
            .await
            .map_err(|_| anyhow!("poller is not running"))?;

        rx.await?;
        Ok(())
    }

    /// Stop the poller and wait until every in-flight result is persisted
    pub async fn stop(self) -> Result<PollerStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::Stop { respond_to: tx })
            .await
            .map_err(|_| anyhow!("poller is not running"))?;

        let stats = rx.await?;
        if let Err(e) = self.task.await {
            error!("poller task failed: {e}");
        }
        Ok(stats)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PollerState {
        *self.state_rx.borrow()
    }

    /// Snapshot of the live counters
    pub fn stats(&self) -> PollerStats {
        self.counters.snapshot()
    }

    /// Cloneable view on the counters and state, for the query API
    pub fn monitor(&self) -> PollerMonitor {
        PollerMonitor {
            state_rx: self.state_rx.clone(),
            counters: self.counters.clone(),
        }
    }
}

/// Stop the poller and close the store it writes to, in that order
///
/// The store is closed even if stopping fails, and only after every
/// dispatched result was persisted.
pub async fn shutdown(poller: PollerHandle, storage: &dyn StorageBackend) -> Result<PollerStats> {
    let stopped = poller.stop().await;
    if let Err(e) = storage.close().await {
        error!("failed to close storage: {e}");
    }
    stopped
}

/// Read-only view of a poller that cannot stop it
#[derive(Clone)]
pub struct PollerMonitor {
    state_rx: watch::Receiver<PollerState>,
    counters: Arc<PollerCounters>,
}

impl PollerMonitor {
    pub fn state(&self) -> PollerState {
        *self.state_rx.borrow()
    }

    pub fn stats(&self) -> PollerStats {
        self.counters.snapshot()
    }
}

// ============================================================================
// Tests
// ============================================================================
