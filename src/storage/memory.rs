//! In-memory storage (no persistence)
//!
//! Keeps everything behind one `RwLock`. Useful for tests and for running
//! the engine without a database; all data is lost on restart.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::backend::{Storage, TargetInsert};
use super::error::StorageResult;
use super::schema::{
    AlertEvent, CheckRecord, Target, TargetId, TargetState, UptimeStats,
};

#[derive(Default)]
struct Inner {
    targets: HashMap<TargetId, Target>,
    checks: Vec<CheckRecord>,
    alerts: Vec<AlertEvent>,
    next_id: TargetId,
}

/// Lock-guarded in-memory store
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alert history accessor for assertions in tests.
    pub fn alert_events(&self) -> Vec<AlertEvent> {
        self.inner.read().expect("store lock poisoned").alerts.clone()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn add_target(
        &self,
        name: &str,
        url: &str,
        interval_secs: u64,
    ) -> StorageResult<TargetInsert> {
        let mut inner = self.inner.write().expect("store lock poisoned");

        if inner.targets.values().any(|t| t.url == url) {
            return Ok(TargetInsert::Duplicate);
        }

        inner.next_id += 1;
        let target = Target {
            id: inner.next_id,
            name: name.to_string(),
            url: url.to_string(),
            check_interval_secs: interval_secs,
            active: true,
            state: TargetState::default(),
        };
        inner.targets.insert(target.id, target.clone());

        Ok(TargetInsert::Created(target))
    }

    async fn list_targets(&self, active_only: bool) -> StorageResult<Vec<Target>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut targets: Vec<Target> = inner
            .targets
            .values()
            .filter(|t| !active_only || t.active)
            .cloned()
            .collect();
        targets.sort_by_key(|t| t.id);
        Ok(targets)
    }

    async fn get_target(&self, id: TargetId) -> StorageResult<Option<Target>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.targets.get(&id).cloned())
    }

    async fn update_target_state(&self, id: TargetId, state: &TargetState) -> StorageResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if let Some(target) = inner.targets.get_mut(&id) {
            target.state = state.clone();
        }
        Ok(())
    }

    async fn set_target_active(&self, id: TargetId, active: bool) -> StorageResult<bool> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        match inner.targets.get_mut(&id) {
            Some(target) => {
                target.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_tick(
        &self,
        id: TargetId,
        state: &TargetState,
        record: &CheckRecord,
    ) -> StorageResult<()> {
        // one lock acquisition stands in for the transaction
        let mut inner = self.inner.write().expect("store lock poisoned");
        if let Some(target) = inner.targets.get_mut(&id) {
            target.state = state.clone();
        }
        inner.checks.push(record.clone());
        Ok(())
    }

    async fn append_check_record(&self, record: &CheckRecord) -> StorageResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.checks.push(record.clone());
        Ok(())
    }

    async fn append_alert_event(&self, event: &AlertEvent) -> StorageResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.alerts.push(event.clone());
        Ok(())
    }

    async fn query_check_records(
        &self,
        id: TargetId,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<CheckRecord>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut records: Vec<CheckRecord> = inner
            .checks
            .iter()
            .filter(|r| r.target_id == id && r.timestamp >= since)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn uptime_since(&self, id: TargetId, since: DateTime<Utc>) -> StorageResult<UptimeStats> {
        let inner = self.inner.read().expect("store lock poisoned");
        let relevant = inner
            .checks
            .iter()
            .filter(|r| r.target_id == id && r.timestamp >= since);

        let mut total = 0u64;
        let mut up = 0u64;
        for record in relevant {
            total += 1;
            if record.is_up {
                up += 1;
            }
        }

        Ok(UptimeStats::from_counts(total, up))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
