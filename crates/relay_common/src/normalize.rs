//! Normalization layer: raw telemetry payload -> canonical snapshot.
//!
//! The backend delivers telemetry in several incompatible shapes (push
//! frames and poll documents, numbers as strings, status codes as an
//! object or an array, timestamps as epoch-ms or ISO-8601). `normalize`
//! is pure and total: it never panics and has a defined output for every
//! input, including the empty document.

use crate::snapshot::{
    CircuitBreakerCounts, LatencySeries, MetricSeries, MetricsSnapshot, MetricsSummary,
    SeriesPoint, SloTargets, StatusCodeCounts,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Convert an arbitrary raw telemetry payload into the canonical snapshot.
pub fn normalize(raw: &Value) -> MetricsSnapshot {
    MetricsSnapshot {
        summary: normalize_summary(raw.get("summary")),
        request_rate: normalize_series(raw.get("requestRate"), "requestRate", "req/s"),
        error_rate: normalize_series(raw.get("errorRate"), "errorRate", "%"),
        latency: normalize_latency(raw.get("latency")),
        status_codes: normalize_status_codes(raw.get("statusCodes")),
        slo: normalize_slo(raw.get("slo")),
        circuit_breakers: normalize_breakers(raw.get("circuitBreakers")),
        received_at: Utc::now(),
    }
}

/// Coerce a JSON value to a finite f64. Numeric strings are accepted;
/// anything non-finite or unparseable becomes 0.
fn coerce_f64(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Coerce to a non-negative integer count.
fn coerce_count(value: Option<&Value>) -> u64 {
    let n = coerce_f64(value);
    if n > 0.0 {
        n as u64
    } else {
        0
    }
}

/// Coerce a timestamp to epoch milliseconds. Accepts epoch-ms numbers
/// (including numeric strings) and ISO-8601 strings; anything else
/// defaults to "now".
fn coerce_timestamp_ms(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_else(now_ms),
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return ms;
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp_millis())
                .unwrap_or_else(|_| now_ms())
        }
        _ => now_ms(),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Headline summary. Prefers the all-time monotonic request counter over
/// the windowed one, and an explicit availability/uptime percentage over
/// absence. Everything defaults to 0.
fn normalize_summary(summary: Option<&Value>) -> MetricsSummary {
    let summary = match summary {
        Some(v) if v.is_object() => v,
        _ => return MetricsSummary::default(),
    };

    let total_requests = if summary.get("totalRequestsAllTime").is_some() {
        coerce_f64(summary.get("totalRequestsAllTime"))
    } else {
        coerce_f64(summary.get("totalRequests"))
    };

    let uptime = ["availability", "uptimePercent", "uptime"]
        .iter()
        .find_map(|key| summary.get(*key))
        .map(|v| coerce_f64(Some(v)))
        .unwrap_or(0.0);

    MetricsSummary {
        total_requests,
        avg_latency: coerce_f64(summary.get("avgLatency")),
        error_rate: coerce_f64(summary.get("errorRate")),
        uptime,
    }
}

/// Extract a series. Points accept `timestamp`/`time`/`ts` and
/// `value`/`v`; output is always sorted ascending by timestamp.
fn normalize_series(series: Option<&Value>, name: &str, unit: &str) -> MetricSeries {
    let mut points: Vec<SeriesPoint> = match series {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter(|e| e.is_object())
            .map(|entry| SeriesPoint {
                timestamp: coerce_timestamp_ms(
                    entry
                        .get("timestamp")
                        .or_else(|| entry.get("time"))
                        .or_else(|| entry.get("ts")),
                ),
                value: coerce_f64(entry.get("value").or_else(|| entry.get("v"))),
            })
            .collect(),
        _ => Vec::new(),
    };
    points.sort_by_key(|p| p.timestamp);
    MetricSeries {
        name: name.to_string(),
        unit: unit.to_string(),
        points,
    }
}

fn normalize_latency(latency: Option<&Value>) -> LatencySeries {
    let latency = match latency {
        Some(v) if v.is_object() => v,
        _ => return LatencySeries::default(),
    };
    LatencySeries {
        p50: normalize_series(latency.get("p50"), "latency.p50", "ms"),
        p95: normalize_series(latency.get("p95"), "latency.p95", "ms"),
        p99: normalize_series(latency.get("p99"), "latency.p99", "ms"),
    }
}

/// Status-code bucketing. Accepts an object keyed by bucket name or an
/// array of `{code, count}` classified by the leading digit of the code.
/// Codes with an unrecognized leading digit are silently dropped.
fn normalize_status_codes(codes: Option<&Value>) -> StatusCodeCounts {
    match codes {
        Some(Value::Object(map)) => StatusCodeCounts {
            success: coerce_count(map.get("2xx")),
            redirect: coerce_count(map.get("3xx")),
            client_error: coerce_count(map.get("4xx")),
            server_error: coerce_count(map.get("5xx")),
        },
        Some(Value::Array(entries)) => {
            let mut counts = StatusCodeCounts::default();
            for entry in entries {
                let code = match entry.get("code") {
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::String(s)) => s.trim().to_string(),
                    _ => continue,
                };
                let count = coerce_count(entry.get("count"));
                match code.chars().next() {
                    Some('2') => counts.success += count,
                    Some('3') => counts.redirect += count,
                    Some('4') => counts.client_error += count,
                    Some('5') => counts.server_error += count,
                    _ => {} // unrecognized leading digit, dropped
                }
            }
            counts
        }
        _ => StatusCodeCounts::default(),
    }
}

/// SLO targets with per-field defaults when the section or a field is absent.
fn normalize_slo(slo: Option<&Value>) -> SloTargets {
    let defaults = SloTargets::default();
    let slo = match slo {
        Some(v) if v.is_object() => v,
        _ => return defaults,
    };
    let field = |keys: &[&str], default: f64| {
        keys.iter()
            .find_map(|key| slo.get(*key))
            .map(|v| coerce_f64(Some(v)))
            .unwrap_or(default)
    };
    SloTargets {
        availability: field(&["availability"], defaults.availability),
        latency_ms: field(&["latencyMs", "latency"], defaults.latency_ms),
        error_rate: field(&["errorRate"], defaults.error_rate),
    }
}

fn normalize_breakers(breakers: Option<&Value>) -> CircuitBreakerCounts {
    let breakers = match breakers {
        Some(v) if v.is_object() => v,
        _ => return CircuitBreakerCounts::default(),
    };
    CircuitBreakerCounts {
        open: coerce_count(breakers.get("open")),
        half_open: coerce_count(breakers.get("halfOpen")),
        closed: coerce_count(breakers.get("closed")),
    }
}
