//! Property-based tests for the target state machine
//!
//! These tests verify invariants over arbitrary up/down probe sequences:
//! - The failure counter equals the length of the trailing failure run
//! - Exactly one DOWN alert per outage episode that reaches the threshold
//! - No DOWN alert fires before the threshold is reached
//! - Any success resets the counter and recovers a down target

use chrono::Utc;
use proptest::prelude::*;
use sitewatch::monitors::status::{Thresholds, evaluate};
use sitewatch::{AlertEvent, AlertKind, ProbeOutcome, Target, TargetState};

fn outcome(up: bool) -> ProbeOutcome {
    if up {
        ProbeOutcome::from_response(200, 0.1, "fp".to_string(), Utc::now())
    } else {
        ProbeOutcome::transport_failure("connection refused".to_string(), 0.1, Utc::now())
    }
}

fn fresh_target() -> Target {
    Target {
        id: 1,
        name: "prop-target".to_string(),
        url: "https://prop.test/".to_string(),
        check_interval_secs: 60,
        active: true,
        state: TargetState::default(),
    }
}

fn run_sequence(outcomes: &[bool], limit: u32) -> (TargetState, Vec<AlertEvent>) {
    let thresholds = Thresholds {
        failure_limit: limit,
        slow_response_secs: 5.0,
    };
    let mut target = fresh_target();
    let mut alerts = Vec::new();

    for &up in outcomes {
        let eval = evaluate(&target, &outcome(up), &thresholds);
        alerts.extend(eval.alerts);
        target.state = eval.state;
    }

    (target.state, alerts)
}

// Property: the failure counter always equals the trailing run of failures
proptest! {
    #[test]
    fn prop_failure_counter_matches_trailing_run(
        outcomes in proptest::collection::vec(any::<bool>(), 1..60),
        limit in 1u32..6,
    ) {
        let (state, _alerts) = run_sequence(&outcomes, limit);

        let trailing = outcomes.iter().rev().take_while(|&&up| !up).count() as u32;
        prop_assert_eq!(state.consecutive_failures, trailing);
    }
}

// Property: exactly one DOWN alert per outage episode reaching the threshold
proptest! {
    #[test]
    fn prop_one_down_alert_per_outage_episode(
        outcomes in proptest::collection::vec(any::<bool>(), 1..60),
        limit in 1u32..6,
    ) {
        let (_state, alerts) = run_sequence(&outcomes, limit);

        let mut episodes = 0u32;
        let mut run = 0u32;
        for &up in &outcomes {
            if up {
                run = 0;
            } else {
                run += 1;
                if run == limit {
                    episodes += 1;
                }
            }
        }

        let downs = alerts.iter().filter(|a| a.kind == AlertKind::Down).count() as u32;
        prop_assert_eq!(downs, episodes);
    }
}

// Property: a DOWN alert only fires at the exact threshold crossing
proptest! {
    #[test]
    fn prop_no_down_alert_before_threshold(
        outcomes in proptest::collection::vec(any::<bool>(), 1..60),
        limit in 1u32..6,
    ) {
        let thresholds = Thresholds {
            failure_limit: limit,
            slow_response_secs: 5.0,
        };
        let mut target = fresh_target();
        let mut run = 0u32;

        for &up in &outcomes {
            let eval = evaluate(&target, &outcome(up), &thresholds);
            if up {
                run = 0;
            } else {
                run += 1;
            }

            if eval.alerts.iter().any(|a| a.kind == AlertKind::Down) {
                prop_assert_eq!(run, limit);
            }
            target.state = eval.state;
        }
    }
}

// Property: any success resets the counter; recovery alerts fire exactly on
// the first success after a confirmed outage
proptest! {
    #[test]
    fn prop_success_resets_counter_and_recovers(
        outcomes in proptest::collection::vec(any::<bool>(), 1..60),
        limit in 1u32..6,
    ) {
        let thresholds = Thresholds {
            failure_limit: limit,
            slow_response_secs: 5.0,
        };
        let mut target = fresh_target();

        for &up in &outcomes {
            let was_up = target.state.is_up;
            let eval = evaluate(&target, &outcome(up), &thresholds);

            if up {
                prop_assert_eq!(eval.state.consecutive_failures, 0);
                prop_assert!(eval.state.is_up);

                let recovered = eval.alerts.iter().any(|a| a.kind == AlertKind::Up);
                prop_assert_eq!(recovered, !was_up);
            }
            target.state = eval.state;
        }
    }
}

// Property: DOWN and UP alerts strictly alternate, starting with DOWN
proptest! {
    #[test]
    fn prop_transition_alerts_alternate(
        outcomes in proptest::collection::vec(any::<bool>(), 1..60),
        limit in 1u32..6,
    ) {
        let (_state, alerts) = run_sequence(&outcomes, limit);

        let transitions: Vec<AlertKind> = alerts
            .iter()
            .map(|a| a.kind)
            .filter(|k| matches!(k, AlertKind::Down | AlertKind::Up))
            .collect();

        for (i, kind) in transitions.iter().enumerate() {
            let expected = if i % 2 == 0 { AlertKind::Down } else { AlertKind::Up };
            prop_assert_eq!(*kind, expected);
        }
    }
}
