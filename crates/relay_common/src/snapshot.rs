//! Canonical metrics snapshot - the single stable shape handed to consumers.
//!
//! Every field is always populated: normalization fills missing sections
//! with fully-defaulted objects so consumers never null-check. A snapshot
//! replaces its predecessor wholesale; there is no field-level merging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Headline numbers shown on the dashboard stat cards.
/// All values are finite; absent or garbage upstream fields coerce to 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_requests: f64,
    pub avg_latency: f64,
    pub error_rate: f64,
    pub uptime: f64,
}

/// One point of a time series, timestamp in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// A named, unit-tagged series with points in ascending timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    pub unit: String,
    pub points: Vec<SeriesPoint>,
}

impl MetricSeries {
    pub fn empty(name: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            points: Vec::new(),
        }
    }
}

/// Latency percentile series as supplied by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySeries {
    pub p50: MetricSeries,
    pub p95: MetricSeries,
    pub p99: MetricSeries,
}

impl Default for LatencySeries {
    fn default() -> Self {
        Self {
            p50: MetricSeries::empty("latency.p50", "ms"),
            p95: MetricSeries::empty("latency.p95", "ms"),
            p99: MetricSeries::empty("latency.p99", "ms"),
        }
    }
}

/// Response counts bucketed by status class. Always exactly four buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCodeCounts {
    #[serde(rename = "2xx")]
    pub success: u64,
    #[serde(rename = "3xx")]
    pub redirect: u64,
    #[serde(rename = "4xx")]
    pub client_error: u64,
    #[serde(rename = "5xx")]
    pub server_error: u64,
}

/// Service-level objective targets, defaulted when the backend omits them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloTargets {
    /// Target availability in percent.
    pub availability: f64,
    /// Target latency ceiling in milliseconds.
    pub latency_ms: f64,
    /// Target error-rate ceiling in percent.
    pub error_rate: f64,
}

impl Default for SloTargets {
    fn default() -> Self {
        Self {
            availability: 99.9,
            latency_ms: 500.0,
            error_rate: 1.0,
        }
    }
}

/// Circuit breaker population by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerCounts {
    pub open: u64,
    pub half_open: u64,
    pub closed: u64,
}

/// The canonical, schema-stable telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub summary: MetricsSummary,
    pub request_rate: MetricSeries,
    pub error_rate: MetricSeries,
    pub latency: LatencySeries,
    pub status_codes: StatusCodeCounts,
    pub slo: SloTargets,
    pub circuit_breakers: CircuitBreakerCounts,
    /// When this snapshot was normalized (UTC).
    pub received_at: DateTime<Utc>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            summary: MetricsSummary::default(),
            request_rate: MetricSeries::empty("requestRate", "req/s"),
            error_rate: MetricSeries::empty("errorRate", "%"),
            latency: LatencySeries::default(),
            status_codes: StatusCodeCounts::default(),
            slo: SloTargets::default(),
            circuit_breakers: CircuitBreakerCounts::default(),
            received_at: Utc::now(),
        }
    }
}
