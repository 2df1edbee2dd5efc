//! Probe executor
//!
//! Issues a single GET request against a target URL and reduces the result
//! to a [`ProbeOutcome`]. Transport-level failures (connection refused, DNS
//! failure, timeout, TLS error) are normal, reportable outcomes with the
//! status-code 0 sentinel, never errors: `probe` is infallible by design of
//! the tick pipeline.
//!
//! The executor holds no target state; deciding what an outcome *means* is
//! the state machine's job.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{instrument, trace, warn};

use crate::monitors::fingerprint::fingerprint;
use crate::storage::schema::ProbeOutcome;

/// Stateless HTTP prober, cheap to clone (shares one connection pool)
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    client: reqwest::Client,
}

impl ProbeExecutor {
    /// Build an executor with a per-request timeout and identifying header.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// Probe a single URL, measuring elapsed wall-clock time across the
    /// whole exchange (headers and body).
    #[instrument(skip(self))]
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        trace!("probing {url}");

        let start = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = start.elapsed().as_secs_f64();
                warn!("probe failed: {e:#}");
                return ProbeOutcome::transport_failure(short_diagnostic(&e), elapsed, Utc::now());
            }
        };

        let status_code = response.status().as_u16();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let elapsed = start.elapsed().as_secs_f64();
                warn!("failed to read response body: {e:#}");
                return ProbeOutcome::transport_failure(short_diagnostic(&e), elapsed, Utc::now());
            }
        };

        let elapsed = start.elapsed().as_secs_f64();

        ProbeOutcome::from_response(status_code, elapsed, fingerprint(&body), Utc::now())
    }
}

/// Reduce a reqwest error chain to a short, stable diagnostic.
fn short_diagnostic(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        return "request timed out".to_string();
    }
    if e.is_connect() {
        return format!("connection failed: {}", root_cause(e));
    }
    root_cause(e)
}

fn root_cause(e: &reqwest::Error) -> String {
    let mut source: &dyn std::error::Error = e;
    while let Some(inner) = source.source() {
        source = inner;
    }
    source.to_string()
}
