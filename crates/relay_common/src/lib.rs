//! Shared types for the relay dashboard live-metrics pipeline.
//!
//! Everything here is pure: the canonical snapshot model, the frame
//! classifier for push payloads, the normalization layer, the error
//! taxonomy, and client configuration. The transports and the connection
//! state machine live in `relay_metrics`.

pub mod config;
pub mod error;
pub mod frame;
pub mod normalize;
pub mod snapshot;

pub use config::{LiveMetricsConfig, TransportPolicy};
pub use error::MetricsError;
pub use frame::Frame;
pub use normalize::normalize;
pub use snapshot::{
    CircuitBreakerCounts, LatencySeries, MetricSeries, MetricsSnapshot, MetricsSummary,
    SeriesPoint, SloTargets, StatusCodeCounts,
};
