//! Per-target scheduling
//!
//! Every active target gets its own monitor actor: an async task holding a
//! repeating timer, a command channel and the target's runtime state. On
//! each tick the actor runs the full pipeline
//!
//! ```text
//! probe → evaluate → persist (state + check record, atomic) → dispatch
//! ```
//!
//! strictly in that order. Across targets nothing is ordered: a slow or
//! hanging probe (bounded by the request timeout) never delays another
//! target's due tick.
//!
//! The [`Scheduler`] is the registry of monitor handles. Adding a target id
//! that is already scheduled replaces its timer instead of creating a
//! duplicate; removing a target only prevents future ticks, an in-flight
//! tick runs to completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, error, instrument, warn};

use crate::dispatch::AlertDispatcher;
use crate::monitors::status::{Thresholds, evaluate};
use crate::probe::ProbeExecutor;
use crate::storage::Storage;
use crate::storage::schema::{CheckRecord, Target, TargetId, TargetState};

/// Collaborators shared by every target monitor
#[derive(Clone)]
pub struct EngineContext {
    pub probe: ProbeExecutor,
    pub storage: Arc<dyn Storage>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub thresholds: Thresholds,
}

/// Control messages for a single target monitor
enum MonitorCommand {
    /// Trigger an immediate tick (bypassing the interval timer)
    CheckNow {
        respond_to: oneshot::Sender<Result<()>>,
    },

    /// Update the check interval; takes effect immediately
    UpdateInterval { interval_secs: u64 },

    /// Gracefully shut down; an in-flight tick runs to completion
    Shutdown,
}

/// Actor that monitors a single target
struct TargetMonitorActor {
    target: Target,
    ctx: EngineContext,
    command_rx: mpsc::Receiver<MonitorCommand>,
    interval_duration: Duration,
}

impl TargetMonitorActor {
    fn new(target: Target, ctx: EngineContext, command_rx: mpsc::Receiver<MonitorCommand>) -> Self {
        let interval_duration = Duration::from_secs(target.check_interval_secs.max(1));
        Self {
            target,
            ctx,
            command_rx,
            interval_duration,
        }
    }

    #[instrument(skip(self), fields(target = %self.target.name, url = %self.target.url))]
    async fn run(mut self) {
        debug!("starting target monitor");

        let mut ticker = interval(self.interval_duration);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // no error in one tick may affect the schedule
                    if let Err(e) = self.run_tick().await {
                        error!("tick failed, skipping this cycle: {e:#}");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        MonitorCommand::CheckNow { respond_to } => {
                            debug!("received CheckNow command");
                            let result = self.run_tick().await;
                            let _ = respond_to.send(result);
                        }

                        MonitorCommand::UpdateInterval { interval_secs } => {
                            debug!("updating interval to {interval_secs}s");
                            self.interval_duration = Duration::from_secs(interval_secs.max(1));
                            ticker = interval(self.interval_duration);
                        }

                        MonitorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("target monitor stopped");
    }

    /// One tick, isolated on its own task so a panicking collaborator
    /// cannot take the timer down with it.
    ///
    /// A persistence error (or a panic, surfaced as a join error) aborts
    /// the remainder of the tick; the in-memory state only advances once
    /// the matching write has committed, so the next tick evaluates against
    /// the last persisted state.
    async fn run_tick(&mut self) -> Result<()> {
        let tick = tokio::spawn(execute_tick(self.target.clone(), self.ctx.clone()));
        let state = match tick.await {
            Ok(result) => result?,
            Err(e) => bail!("tick aborted: {e}"),
        };
        self.target.state = state;
        Ok(())
    }
}

/// Probe, evaluate, persist, dispatch. Returns the successor state once it
/// has been committed.
async fn execute_tick(target: Target, ctx: EngineContext) -> Result<TargetState> {
    let outcome = ctx.probe.probe(&target.url).await;
    let evaluation = evaluate(&target, &outcome, &ctx.thresholds);
    let record = CheckRecord::from_outcome(target.id, &outcome);

    ctx.storage
        .record_tick(target.id, &evaluation.state, &record)
        .await?;

    for alert in &evaluation.alerts {
        ctx.storage.append_alert_event(alert).await?;
    }

    for alert in &evaluation.alerts {
        // dispatch failures are reported by the dispatcher, never fatal
        ctx.dispatcher.dispatch(alert).await;
    }

    Ok(evaluation.state)
}

/// Handle for controlling a single target monitor
#[derive(Clone)]
pub struct TargetHandle {
    sender: mpsc::Sender<MonitorCommand>,
    target_id: TargetId,
}

impl TargetHandle {
    /// Spawn a monitor actor for a target.
    pub fn spawn(target: Target, ctx: EngineContext) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let target_id = target.id;

        let actor = TargetMonitorActor::new(target, ctx, cmd_rx);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            target_id,
        }
    }

    /// Trigger an immediate tick and wait for its result.
    pub async fn check_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::CheckNow { respond_to: tx })
            .await?;
        rx.await?
    }

    /// Update the check interval.
    pub async fn update_interval(&self, interval_secs: u64) -> Result<()> {
        self.sender
            .send(MonitorCommand::UpdateInterval { interval_secs })
            .await?;
        Ok(())
    }

    /// Cancel the monitor's timer. Future ticks only; an in-flight tick
    /// completes.
    pub async fn shutdown(self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;
    }

    pub fn target_id(&self) -> TargetId {
        self.target_id
    }
}

/// Registry of running target monitors, keyed by target identity
pub struct Scheduler {
    ctx: EngineContext,
    handles: HashMap<TargetId, TargetHandle>,
}

impl Scheduler {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            handles: HashMap::new(),
        }
    }

    /// Register a timer for a target. Re-adding an already-scheduled id
    /// replaces its timer instead of creating a duplicate.
    pub async fn add_target(&mut self, target: Target) {
        let id = target.id;
        debug!(
            "scheduling {} ({}) every {}s",
            target.name, target.url, target.check_interval_secs
        );

        let handle = TargetHandle::spawn(target, self.ctx.clone());
        if let Some(previous) = self.handles.insert(id, handle) {
            debug!("replacing existing timer for target {id}");
            previous.shutdown().await;
        }
    }

    /// Cancel exactly one target's timer. Returns whether it was scheduled.
    pub async fn remove_target(&mut self, id: TargetId) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                handle.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn get(&self, id: TargetId) -> Option<&TargetHandle> {
        self.handles.get(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel all pending timers. In-flight ticks run to completion on
    /// their own tasks.
    pub async fn shutdown(mut self) {
        debug!("shutting down scheduler ({} timers)", self.handles.len());
        for (_, handle) in self.handles.drain() {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use crate::storage::schema::TargetState;

    fn test_ctx() -> (Arc<MemoryStore>, EngineContext) {
        let storage = Arc::new(MemoryStore::new());
        let ctx = EngineContext {
            probe: ProbeExecutor::new(Duration::from_millis(500), "sitewatch-test").unwrap(),
            storage: storage.clone(),
            dispatcher: Arc::new(AlertDispatcher::new(None)),
            thresholds: Thresholds::default(),
        };
        (storage, ctx)
    }

    fn test_target(id: TargetId) -> Target {
        Target {
            id,
            name: format!("target-{id}"),
            url: "http://unreachable.invalid/".to_string(),
            check_interval_secs: 3600,
            active: true,
            state: TargetState::default(),
        }
    }

    #[tokio::test]
    async fn test_add_and_remove_target() {
        let (_storage, ctx) = test_ctx();
        let mut scheduler = Scheduler::new(ctx);

        scheduler.add_target(test_target(1)).await;
        scheduler.add_target(test_target(2)).await;
        assert_eq!(scheduler.len(), 2);
        assert!(scheduler.contains(1));

        assert!(scheduler.remove_target(1).await);
        assert!(!scheduler.contains(1));
        assert!(scheduler.contains(2));

        // removing an unscheduled target is a no-op
        assert!(!scheduler.remove_target(1).await);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_re_adding_replaces_timer() {
        let (_storage, ctx) = test_ctx();
        let mut scheduler = Scheduler::new(ctx);

        scheduler.add_target(test_target(1)).await;
        scheduler.add_target(test_target(1)).await;

        assert_eq!(scheduler.len(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_interval() {
        let (_storage, ctx) = test_ctx();
        let mut scheduler = Scheduler::new(ctx);

        scheduler.add_target(test_target(1)).await;
        scheduler
            .get(1)
            .unwrap()
            .update_interval(30)
            .await
            .unwrap();

        scheduler.shutdown().await;
    }
}
