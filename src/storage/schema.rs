//! Data-transfer structs shared between the engine and storage
//!
//! Everything here is passed by value between components. There is no lazy
//! loading and no session affinity: a [`Target`] read from storage is a
//! plain snapshot, and the engine hands complete [`TargetState`] /
//! [`CheckRecord`] / [`AlertEvent`] values back for persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TargetId = i64;

/// One monitored HTTP endpoint with its own interval and runtime state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,

    /// Unique across all targets
    pub url: String,

    pub check_interval_secs: u64,

    /// Deactivated targets keep their history but are not scheduled
    pub active: bool,

    /// Mutable runtime state, updated in place after every probe
    pub state: TargetState,
}

/// Per-target runtime state carried from tick to tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub is_up: bool,
    pub last_status_code: Option<u16>,
    pub last_response_time: Option<f64>,
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Last known-good content fingerprint; a failed probe preserves it so
    /// change detection survives transient outages
    pub last_fingerprint: Option<String>,

    /// Uninterrupted down outcomes since the last success. Only increments
    /// on failure, reset to 0 on any success; unbounded while down.
    pub consecutive_failures: u32,
}

impl Default for TargetState {
    fn default() -> Self {
        Self {
            is_up: true,
            last_status_code: None,
            last_response_time: None,
            last_checked_at: None,
            last_fingerprint: None,
            consecutive_failures: 0,
        }
    }
}

/// Result of a single probe, produced once per tick
///
/// Ephemeral: projected into a [`CheckRecord`] for history, never stored
/// as its own entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// HTTP status code; 0 is the transport-failure sentinel
    pub status_code: u16,

    /// Elapsed wall-clock seconds (measured to the failure point on error)
    pub response_time: f64,

    pub is_up: bool,

    /// `None` on transport failure; `Some("")` for an empty body
    pub fingerprint: Option<String>,

    /// Short diagnostic, populated only on transport/timeout failure
    pub error: Option<String>,

    pub checked_at: DateTime<Utc>,
}

impl ProbeOutcome {
    /// Outcome for a completed HTTP exchange
    pub fn from_response(
        status_code: u16,
        response_time: f64,
        fingerprint: String,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status_code,
            response_time,
            is_up: status_code > 0 && status_code < 400,
            fingerprint: Some(fingerprint),
            error: None,
            checked_at,
        }
    }

    /// Outcome for a request that never produced a response
    /// (connection refused, DNS failure, timeout, TLS error)
    pub fn transport_failure(
        error: String,
        response_time: f64,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status_code: 0,
            response_time,
            is_up: false,
            fingerprint: None,
            error: Some(error),
            checked_at,
        }
    }
}

/// Append-only history row, one per tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub target_id: TargetId,
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    pub response_time: f64,
    pub is_up: bool,
    pub fingerprint: Option<String>,
    pub error_message: Option<String>,
}

impl CheckRecord {
    pub fn from_outcome(target_id: TargetId, outcome: &ProbeOutcome) -> Self {
        Self {
            target_id,
            timestamp: outcome.checked_at,
            status_code: outcome.status_code,
            response_time: outcome.response_time,
            is_up: outcome.is_up,
            fingerprint: outcome.fingerprint.clone(),
            error_message: outcome.error.clone(),
        }
    }
}

/// Kind of alert emitted by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Down,
    Up,
    ContentChange,
    SlowResponse,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Down => write!(f, "DOWN"),
            AlertKind::Up => write!(f, "UP"),
            AlertKind::ContentChange => write!(f, "CONTENT_CHANGE"),
            AlertKind::SlowResponse => write!(f, "SLOW_RESPONSE"),
        }
    }
}

/// Append-only alert row, one per emitted alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub target_id: TargetId,
    pub timestamp: DateTime<Utc>,
    pub kind: AlertKind,
    pub message: String,
}

impl AlertEvent {
    pub fn new(
        target_id: TargetId,
        timestamp: DateTime<Utc>,
        kind: AlertKind,
        message: String,
    ) -> Self {
        Self {
            target_id,
            timestamp,
            kind,
            message,
        }
    }
}

/// Uptime summary derived from check history
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UptimeStats {
    pub total_checks: u64,
    pub up_checks: u64,
    pub uptime_percent: f64,
}

impl UptimeStats {
    pub fn from_counts(total_checks: u64, up_checks: u64) -> Self {
        let uptime_percent = if total_checks == 0 {
            0.0
        } else {
            up_checks as f64 / total_checks as f64 * 100.0
        };
        Self {
            total_checks,
            up_checks,
            uptime_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outcome_up_range() {
        let now = Utc::now();
        assert!(ProbeOutcome::from_response(200, 0.1, "abc".into(), now).is_up);
        assert!(ProbeOutcome::from_response(302, 0.1, "abc".into(), now).is_up);
        assert!(ProbeOutcome::from_response(399, 0.1, "abc".into(), now).is_up);
        assert!(!ProbeOutcome::from_response(400, 0.1, "abc".into(), now).is_up);
        assert!(!ProbeOutcome::from_response(500, 0.1, "abc".into(), now).is_up);
    }

    #[test]
    fn test_transport_failure_sentinel() {
        let outcome = ProbeOutcome::transport_failure("connection refused".into(), 0.05, Utc::now());
        assert_eq!(outcome.status_code, 0);
        assert!(!outcome.is_up);
        assert_eq!(outcome.fingerprint, None);
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_check_record_projection() {
        let now = Utc::now();
        let outcome = ProbeOutcome::from_response(200, 0.42, "abc123".into(), now);
        let record = CheckRecord::from_outcome(7, &outcome);
        assert_eq!(record.target_id, 7);
        assert_eq!(record.timestamp, now);
        assert_eq!(record.status_code, 200);
        assert!(record.is_up);
        assert_eq!(record.fingerprint.as_deref(), Some("abc123"));
        assert_eq!(record.error_message, None);
    }

    #[test]
    fn test_alert_kind_labels() {
        // these labels end up in the alert_log kind column
        assert_eq!(AlertKind::Down.to_string(), "DOWN");
        assert_eq!(AlertKind::Up.to_string(), "UP");
        assert_eq!(AlertKind::ContentChange.to_string(), "CONTENT_CHANGE");
        assert_eq!(AlertKind::SlowResponse.to_string(), "SLOW_RESPONSE");
    }

    #[test]
    fn test_uptime_stats() {
        let stats = UptimeStats::from_counts(8, 6);
        assert_eq!(stats.uptime_percent, 75.0);

        let empty = UptimeStats::from_counts(0, 0);
        assert_eq!(empty.uptime_percent, 0.0);
    }
}
