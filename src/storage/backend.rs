//! Storage trait definition
//!
//! All storage implementations expose exactly the operations the engine
//! consumes. Implementations must be `Send + Sync` as they are shared
//! across per-target tasks, and must tolerate concurrent writes from
//! independent ticks (transactional or per-call session semantics, never a
//! shared cursor).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{AlertEvent, CheckRecord, Target, TargetId, TargetState, UptimeStats};

/// Outcome of an add-target operation.
///
/// A duplicate URL is a domain-expected condition returned to the caller,
/// not a fault.
#[derive(Debug, Clone)]
pub enum TargetInsert {
    Created(Target),
    Duplicate,
}

/// Persistence operations consumed by the monitoring engine
#[async_trait]
pub trait Storage: Send + Sync {
    /// Register a new target. Rejects a URL that is already tracked with
    /// [`TargetInsert::Duplicate`]; no second row is created.
    async fn add_target(
        &self,
        name: &str,
        url: &str,
        interval_secs: u64,
    ) -> StorageResult<TargetInsert>;

    /// List targets, optionally restricted to active ones.
    async fn list_targets(&self, active_only: bool) -> StorageResult<Vec<Target>>;

    /// Fetch a single target by id.
    async fn get_target(&self, id: TargetId) -> StorageResult<Option<Target>>;

    /// Overwrite a target's runtime state.
    async fn update_target_state(&self, id: TargetId, state: &TargetState) -> StorageResult<()>;

    /// Soft-activate or soft-deactivate a target. Returns whether the
    /// target existed; history rows are never deleted.
    async fn set_target_active(&self, id: TargetId, active: bool) -> StorageResult<bool>;

    /// Persist one tick atomically: the updated runtime state and its
    /// check record commit together or not at all.
    async fn record_tick(
        &self,
        id: TargetId,
        state: &TargetState,
        record: &CheckRecord,
    ) -> StorageResult<()>;

    /// Append a check record outside of a tick (no state update).
    async fn append_check_record(&self, record: &CheckRecord) -> StorageResult<()>;

    /// Append an emitted alert to the alert history.
    async fn append_alert_event(&self, event: &AlertEvent) -> StorageResult<()>;

    /// Check history for a target since a point in time, oldest first.
    async fn query_check_records(
        &self,
        id: TargetId,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<CheckRecord>>;

    /// Uptime percentage derived from the check history since a point in
    /// time.
    async fn uptime_since(&self, id: TargetId, since: DateTime<Utc>) -> StorageResult<UptimeStats>;

    /// Close the backend and release resources.
    async fn close(&self) -> StorageResult<()>;
}
