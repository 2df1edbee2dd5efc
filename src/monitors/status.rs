//! Target state machine
//!
//! Turns one probe outcome plus the prior target state into the new state
//! and the list of alerts to emit. Pure over its inputs: no I/O, no clock,
//! no shared state, which is what makes every transition testable in
//! isolation.
//!
//! ## Transition rules (evaluated in order, every tick)
//!
//! ```text
//! outcome up:
//!   consecutive_failures = 0
//!   prior DOWN                  → UP, emit recovery alert
//! outcome down:
//!   consecutive_failures += 1
//!   prior UP && counter reaches
//!   the failure threshold       → DOWN, emit down alert (exactly once)
//! outcome up, prior non-empty fingerprint differs → emit content-change
//! outcome up, response time over threshold        → emit slow-response
//! ```
//!
//! The content-change and slow-response checks are independent of the
//! up/down transition and may co-occur with a recovery alert on the same
//! tick.

use crate::storage::schema::{AlertEvent, AlertKind, ProbeOutcome, Target, TargetState};

/// Alerting thresholds, fixed per engine run
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Consecutive failures before a target transitions to DOWN (>= 1)
    pub failure_limit: u32,

    /// Response times above this many seconds emit a slow-response alert
    pub slow_response_secs: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            failure_limit: 3,
            slow_response_secs: 5.0,
        }
    }
}

/// Output of one evaluation: the successor state and the alerts it produced
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state: TargetState,
    pub alerts: Vec<AlertEvent>,
}

/// Evaluate a probe outcome against the target's prior state.
///
/// The returned state always carries the latest status code, response time
/// and check timestamp; the fingerprint is only overwritten when the new
/// outcome produced a non-empty one.
pub fn evaluate(target: &Target, outcome: &ProbeOutcome, thresholds: &Thresholds) -> Evaluation {
    let prior = &target.state;
    let mut state = prior.clone();
    let mut alerts = Vec::new();

    if outcome.is_up {
        state.consecutive_failures = 0;
        if !prior.is_up {
            state.is_up = true;
            alerts.push(AlertEvent::new(
                target.id,
                outcome.checked_at,
                AlertKind::Up,
                format!("RECOVERED: {} is back online!", target.name),
            ));
        }
    } else {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if prior.is_up && state.consecutive_failures >= thresholds.failure_limit {
            state.is_up = false;
            let reason = outcome
                .error
                .clone()
                .unwrap_or_else(|| format!("Status {}", outcome.status_code));
            alerts.push(AlertEvent::new(
                target.id,
                outcome.checked_at,
                AlertKind::Down,
                format!("DOWN: {} is unreachable!\nReason: {reason}", target.name),
            ));
        }
    }

    if outcome.is_up {
        if let (Some(prev), Some(new)) = (&prior.last_fingerprint, &outcome.fingerprint) {
            if !prev.is_empty() && prev != new {
                alerts.push(AlertEvent::new(
                    target.id,
                    outcome.checked_at,
                    AlertKind::ContentChange,
                    format!("CHANGE DETECTED: Content modified on {}!", target.name),
                ));
            }
        }

        if outcome.response_time > thresholds.slow_response_secs {
            alerts.push(AlertEvent::new(
                target.id,
                outcome.checked_at,
                AlertKind::SlowResponse,
                format!(
                    "SLOW: {} response time: {:.2}s",
                    target.name, outcome.response_time
                ),
            ));
        }
    }

    state.last_status_code = Some(outcome.status_code);
    state.last_response_time = Some(outcome.response_time);
    state.last_checked_at = Some(outcome.checked_at);
    if let Some(fingerprint) = &outcome.fingerprint {
        if !fingerprint.is_empty() {
            state.last_fingerprint = Some(fingerprint.clone());
        }
    }

    Evaluation { state, alerts }
}
