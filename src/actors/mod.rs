//! Actor-based polling engine
//!
//! The poller runs as an independent async task and is driven through an mpsc
//! command channel. Work flows through two bounded queues to two worker pools:
//!
//! ```text
//!  ┌────────────┐  dispatch   ┌───────────────┐  results   ┌─────────────────┐
//!  │ PollerActor│ ──────────→ │ probe workers │ ─────────→ │ persist workers │ ─→ storage
//!  └────────────┘             └───────────────┘            └─────────────────┘
//!        ↑
//!        └── PollerHandle (TickNow, Stop)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels acknowledge commands
//! 3. **State**: a watch channel publishes the lifecycle state

pub mod messages;
pub mod poller;
