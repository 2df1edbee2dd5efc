//! Environment-driven configuration
//!
//! All options are read from the process environment (a `.env` file is
//! loaded by the binary before this runs). Unset or unparsable values fall
//! back to their defaults.

use std::time::Duration;

use tracing::trace;

const DATABASE_URL: &str = "DATABASE_URL";
const NOTIFY_TOKEN: &str = "NOTIFY_TOKEN";
const NOTIFY_CHANNEL: &str = "NOTIFY_CHANNEL";
const DEFAULT_INTERVAL: &str = "DEFAULT_INTERVAL";
const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
const FAILURE_THRESHOLD: &str = "FAILURE_THRESHOLD";
const MAX_RESPONSE_TIME: &str = "MAX_RESPONSE_TIME";

const DEFAULT_DATABASE_URL: &str = "sqlite://monitor.db";
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_MAX_RESPONSE_TIME: f64 = 5.0;

const USER_AGENT: &str = concat!("sitewatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database location (`sqlite://...` or a plain path)
    pub database_url: String,

    /// Notification sink token; without it alerts stay local
    pub notify_token: Option<String>,

    /// Channel/chat the sink delivers to
    pub notify_channel: Option<String>,

    /// Check interval for targets added without an explicit one
    pub default_interval_secs: u64,

    /// Per-request timeout for probes
    pub request_timeout_secs: u64,

    /// Consecutive failures before a target is considered down (>= 1)
    pub failure_threshold: u32,

    /// Response times above this (seconds) emit a slow-response alert
    pub max_response_time: f64,

    /// User-Agent header sent with every probe
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Self {
        let config = Self {
            database_url: env_or(DATABASE_URL, DEFAULT_DATABASE_URL.to_string()),
            notify_token: std::env::var(NOTIFY_TOKEN).ok(),
            notify_channel: std::env::var(NOTIFY_CHANNEL).ok(),
            default_interval_secs: env_parsed(DEFAULT_INTERVAL, DEFAULT_INTERVAL_SECS),
            request_timeout_secs: env_parsed(REQUEST_TIMEOUT, DEFAULT_TIMEOUT_SECS),
            failure_threshold: parse_threshold(std::env::var(FAILURE_THRESHOLD).ok()),
            max_response_time: env_parsed(MAX_RESPONSE_TIME, DEFAULT_MAX_RESPONSE_TIME),
            user_agent: USER_AGENT.to_string(),
        };
        trace!("loaded config: {config:?}");
        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            notify_token: None,
            notify_channel: None,
            default_interval_secs: DEFAULT_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            max_response_time: DEFAULT_MAX_RESPONSE_TIME,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key).map_or(default, |res| res.parse().unwrap_or(default))
}

/// The down threshold must be at least one consecutive failure.
fn parse_threshold(raw: Option<String>) -> u32 {
    raw.and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_FAILURE_THRESHOLD)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_interval_secs, 60);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.max_response_time, 5.0);
        assert!(config.notify_token.is_none());
    }

    #[test]
    fn test_threshold_parsing() {
        assert_eq!(parse_threshold(Some("5".to_string())), 5);

        // a configured threshold of 0 is clamped to one failure
        assert_eq!(parse_threshold(Some("0".to_string())), 1);

        // unset or unparsable values fall back to the default
        assert_eq!(parse_threshold(None), DEFAULT_FAILURE_THRESHOLD);
        assert_eq!(parse_threshold(Some("junk".to_string())), DEFAULT_FAILURE_THRESHOLD);
    }
}
