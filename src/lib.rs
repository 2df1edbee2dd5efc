//! HTTP target monitoring engine
//!
//! This crate probes a set of HTTP targets at independent intervals,
//! detects state transitions (up/down, content change, latency
//! degradation), persists history and dispatches deduplicated alerts.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │   Scheduler     │
//!                 └────────┬────────┘
//!                          │ spawns one actor per target
//!           ┌──────────────┼──────────────┐
//!           │              │              │
//!   ┌───────▼───────┐      │      ┌───────▼───────┐
//!   │ Monitor-1     │     ...     │ Monitor-N     │
//!   │ (Target A)    │             │ (Target N)    │
//!   └───────┬───────┘             └───────┬───────┘
//!           │  probe → evaluate → persist → dispatch
//!           │                             │
//!      ┌────▼─────────┐          ┌────────▼────────┐
//!      │   Storage    │          │ AlertDispatcher │
//!      └──────────────┘          └─────────────────┘
//! ```
//!
//! Each monitor actor runs one tick at a time: probe the target, feed the
//! outcome and the prior state through the pure state machine, persist the
//! new state together with a check record, then hand each emitted alert to
//! the shared [`dispatch::AlertDispatcher`]. Ticks for different targets run
//! on independent tasks and never block each other.

pub mod config;
pub mod dispatch;
pub mod monitors;
pub mod probe;
pub mod scheduler;
pub mod storage;

pub use config::Config;
pub use dispatch::AlertDispatcher;
pub use monitors::status::{Evaluation, Thresholds, evaluate};
pub use probe::ProbeExecutor;
pub use scheduler::Scheduler;
pub use storage::schema::{
    AlertEvent, AlertKind, CheckRecord, ProbeOutcome, Target, TargetId, TargetState,
};
