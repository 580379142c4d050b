//! API shared state

use crate::actors::poller::PollerMonitor;
use crate::query::QueryFacade;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Read side of the latency store
    pub query: QueryFacade,

    /// View on the running poller, if any
    pub poller: Option<PollerMonitor>,
}

impl ApiState {
    pub fn new(query: QueryFacade) -> Self {
        Self {
            query,
            poller: None,
        }
    }

    pub fn with_poller(mut self, poller: PollerMonitor) -> Self {
        self.poller = Some(poller);
        self
    }
}
