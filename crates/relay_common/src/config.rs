//! Client configuration for the live-metrics pipeline.
//!
//! Loads settings from a TOML file or uses defaults. The dashboard may be
//! served from a different origin than the telemetry backend, so endpoint
//! paths resolve against a configurable base origin unless they are
//! already absolute URLs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default push endpoint path.
pub const DEFAULT_STREAM_PATH: &str = "/api/stream/metrics";

/// Default pull endpoint path.
pub const DEFAULT_POLL_PATH: &str = "/api/metrics/live";

/// Reconnection policy after a push failure. The two policies are
/// mutually exclusive per deployment: an instance either retries push
/// indefinitely or permanently falls back to polling until an explicit
/// reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportPolicy {
    /// Keep retrying the push connection on a fixed delay.
    #[serde(rename = "retry-push")]
    RetryPush,
    /// Fall back to the polling transport after the first push failure.
    #[serde(rename = "push-then-poll")]
    PushThenPoll,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        TransportPolicy::PushThenPoll
    }
}

impl FromStr for TransportPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retry-push" => Ok(TransportPolicy::RetryPush),
            "push-then-poll" => Ok(TransportPolicy::PushThenPoll),
            other => Err(format!(
                "unknown transport policy '{}' (expected 'retry-push' or 'push-then-poll')",
                other
            )),
        }
    }
}

impl fmt::Display for TransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportPolicy::RetryPush => write!(f, "retry-push"),
            TransportPolicy::PushThenPoll => write!(f, "push-then-poll"),
        }
    }
}

/// Live-metrics client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMetricsConfig {
    /// Base origin of the telemetry backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Push endpoint: path resolved against `base_url`, or absolute URL.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Pull endpoint: path resolved against `base_url`, or absolute URL.
    #[serde(default = "default_poll_path")]
    pub poll_path: String,

    /// Reconnection policy after a push failure.
    #[serde(default)]
    pub transport: TransportPolicy,

    /// Delay before a push reconnection attempt (retry-push policy).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Interval between poll fetches (push-then-poll policy).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_stream_path() -> String {
    DEFAULT_STREAM_PATH.to_string()
}

fn default_poll_path() -> String {
    DEFAULT_POLL_PATH.to_string()
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl Default for LiveMetricsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            poll_path: default_poll_path(),
            transport: TransportPolicy::default(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LiveMetricsConfig {
    /// Load config from a file, or return defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::load_from_path(path.as_ref()).unwrap_or_else(|e| {
            warn!("Config not found, using defaults: {}", e);
            Self::default()
        })
    }

    fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Fully-resolved push endpoint URL.
    pub fn stream_url(&self) -> String {
        resolve_url(&self.base_url, &self.stream_path)
    }

    /// Fully-resolved pull endpoint URL.
    pub fn poll_url(&self) -> String {
        resolve_url(&self.base_url, &self.poll_path)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// A path that is already an absolute http(s) URL is used verbatim;
/// otherwise it is prefixed with the base origin.
fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LiveMetricsConfig::default();
        assert_eq!(config.transport, TransportPolicy::PushThenPoll);
        assert_eq!(config.retry_delay_ms, 5_000);
        assert_eq!(config.poll_interval_ms, 5_000);
        assert_eq!(config.stream_path, "/api/stream/metrics");
        assert_eq!(config.poll_path, "/api/metrics/live");
    }

    #[test]
    fn test_relative_path_resolves_against_base() {
        let config = LiveMetricsConfig {
            base_url: "http://gateway:9000/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.stream_url(), "http://gateway:9000/api/stream/metrics");
        assert_eq!(config.poll_url(), "http://gateway:9000/api/metrics/live");
    }

    #[test]
    fn test_absolute_url_used_verbatim() {
        let config = LiveMetricsConfig {
            stream_path: "https://telemetry.example.com/stream".to_string(),
            ..Default::default()
        };
        assert_eq!(config.stream_url(), "https://telemetry.example.com/stream");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: LiveMetricsConfig =
            toml::from_str("transport = \"retry-push\"\nretry_delay_ms = 250\n").unwrap();
        assert_eq!(config.transport, TransportPolicy::RetryPush);
        assert_eq!(config.retry_delay_ms, 250);
        assert_eq!(config.poll_interval_ms, 5_000);
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = LiveMetricsConfig::load("/nonexistent/relay-metrics.toml");
        assert_eq!(config, LiveMetricsConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://10.0.0.2:8080\"").unwrap();
        writeln!(file, "transport = \"retry-push\"").unwrap();
        let config = LiveMetricsConfig::load(file.path());
        assert_eq!(config.base_url, "http://10.0.0.2:8080");
        assert_eq!(config.transport, TransportPolicy::RetryPush);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "retry-push".parse::<TransportPolicy>().unwrap(),
            TransportPolicy::RetryPush
        );
        assert!("both".parse::<TransportPolicy>().is_err());
    }
}
