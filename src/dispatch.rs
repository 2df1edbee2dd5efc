//! Alert dispatch
//!
//! The dispatcher sits between the state machine and the notification
//! transport. It rate-limits per `(target, alert kind)` with a fixed
//! cooldown window, then delivers through a pluggable [`NotificationSink`].
//! Delivery failures are reported as a failed dispatch and never propagate
//! into the calling tick.
//!
//! The cooldown map is an explicit component owned by the dispatcher (one
//! instance shared by all target monitors), guarded by a mutex since ticks
//! for different targets race to update it. It lives for the process
//! lifetime only and is not persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, error, info, instrument};

use crate::storage::schema::{AlertEvent, AlertKind, TargetId};

/// Minimum elapsed time between two deliveries of the same alert kind for
/// the same target.
pub const ALERT_COOLDOWN_SECS: i64 = 600;

/// Delivery transport for notifications. Fire-and-forget: the dispatcher
/// supplies the deduplication key handling, sinks only carry the message.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Sink that posts messages to the Telegram Bot API
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    token: String,
    chat_id: String,
    api_base: String,
}

impl TelegramSink {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }

    /// Point the sink at a different API host (used by tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": message,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("failed to reach notification endpoint")?;

        if !response.status().is_success() {
            bail!("notification endpoint returned {}", response.status());
        }

        Ok(())
    }
}

/// Deduplicating, rate-limited alert delivery
pub struct AlertDispatcher {
    sink: Option<Arc<dyn NotificationSink>>,
    cooldown: Duration,
    last_sent: Mutex<HashMap<(TargetId, AlertKind), DateTime<Utc>>>,
}

impl AlertDispatcher {
    /// Dispatcher with the default ten-minute cooldown. Without a sink,
    /// alerts degrade to a local log notice.
    pub fn new(sink: Option<Arc<dyn NotificationSink>>) -> Self {
        Self::with_cooldown(sink, Duration::seconds(ALERT_COOLDOWN_SECS))
    }

    pub fn with_cooldown(sink: Option<Arc<dyn NotificationSink>>, cooldown: Duration) -> Self {
        Self {
            sink,
            cooldown,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver an alert, returning whether it actually went out.
    #[instrument(skip(self, alert), fields(target_id = alert.target_id, kind = %alert.kind))]
    pub async fn dispatch(&self, alert: &AlertEvent) -> bool {
        self.dispatch_at(alert, Utc::now()).await
    }

    /// Clock-injection point for [`dispatch`](Self::dispatch); `now` is only
    /// used for the cooldown bookkeeping.
    pub async fn dispatch_at(&self, alert: &AlertEvent, now: DateTime<Utc>) -> bool {
        let key = (alert.target_id, alert.kind);

        {
            let mut last_sent = self.last_sent.lock().expect("cooldown map lock poisoned");

            if let Some(last) = last_sent.get(&key) {
                if now - *last < self.cooldown {
                    // suppressed sends do not refresh the window
                    debug!(
                        "alert suppressed (cooldown): target {} kind {}",
                        alert.target_id, alert.kind
                    );
                    return false;
                }
            }

            last_sent.insert(key, now);
        }

        let Some(sink) = &self.sink else {
            info!("[local alert] {}", alert.message);
            return false;
        };

        match sink.send(&alert.message).await {
            Ok(()) => {
                info!("alert delivered: {}", alert.kind);
                true
            }
            Err(e) => {
                error!("failed to deliver alert: {e:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Sink that records every message it is asked to send
    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, message: &str) -> Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push(message.to_string());
            if self.fail {
                bail!("sink unreachable");
            }
            Ok(())
        }
    }

    fn alert(target_id: TargetId, kind: AlertKind, at: DateTime<Utc>) -> AlertEvent {
        AlertEvent::new(target_id, at, kind, format!("{kind} on target {target_id}"))
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_cooldown_window() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = AlertDispatcher::new(Some(sink.clone()));

        let a = alert(1, AlertKind::Down, t(0));
        assert!(dispatcher.dispatch_at(&a, t(0)).await);
        assert!(!dispatcher.dispatch_at(&a, t(300)).await);
        assert!(dispatcher.dispatch_at(&a, t(601)).await);

        assert_eq!(sink.messages.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_suppression_does_not_refresh_window() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = AlertDispatcher::new(Some(sink.clone()));

        let a = alert(1, AlertKind::Down, t(0));
        assert!(dispatcher.dispatch_at(&a, t(0)).await);
        // repeated suppressed sends inside the window
        assert!(!dispatcher.dispatch_at(&a, t(200)).await);
        assert!(!dispatcher.dispatch_at(&a, t(400)).await);
        assert!(!dispatcher.dispatch_at(&a, t(599)).await);
        // window is measured from the last *delivery*, not the last attempt
        assert!(dispatcher.dispatch_at(&a, t(600)).await);
    }

    #[tokio::test]
    async fn test_distinct_kinds_and_targets_are_independent() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = AlertDispatcher::new(Some(sink.clone()));

        assert!(dispatcher.dispatch_at(&alert(1, AlertKind::Down, t(0)), t(0)).await);
        assert!(dispatcher.dispatch_at(&alert(1, AlertKind::SlowResponse, t(1)), t(1)).await);
        assert!(dispatcher.dispatch_at(&alert(2, AlertKind::Down, t(2)), t(2)).await);

        assert_eq!(sink.messages.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unconfigured_sink_reports_failure() {
        let dispatcher = AlertDispatcher::new(None);
        assert!(!dispatcher.dispatch_at(&alert(1, AlertKind::Up, t(0)), t(0)).await);
    }

    #[tokio::test]
    async fn test_sink_errors_are_reported_not_propagated() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let dispatcher = AlertDispatcher::new(Some(sink.clone()));

        assert!(!dispatcher.dispatch_at(&alert(1, AlertKind::Down, t(0)), t(0)).await);
        // the attempt still consumed the cooldown window
        assert!(!dispatcher.dispatch_at(&alert(1, AlertKind::Down, t(1)), t(1)).await);
    }
}
