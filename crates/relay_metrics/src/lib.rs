//! Live-metrics delivery client for the relay dashboard.
//!
//! Keeps the dashboard's view of gateway telemetry continuously fresh:
//! prefers the push transport (server-sent events), degrades to a polling
//! fallback when push is unavailable, normalizes every payload into the
//! canonical snapshot, and guarantees race-free connection lifecycle
//! (at most one active transport, at most one pending timer, no updates
//! after teardown).
//!
//! ```no_run
//! use relay_metrics::{LiveMetricsClient, LiveMetricsConfig};
//!
//! # async fn demo() {
//! let client = LiveMetricsClient::connect(LiveMetricsConfig::default());
//! let mut handle = client.handle();
//! while handle.changed().await {
//!     let view = handle.view();
//!     if let Some(snapshot) = view.data {
//!         println!("{} req total", snapshot.summary.total_requests);
//!     }
//! }
//! # }
//! ```

pub mod client;
pub mod poll;
pub mod sse;

pub use client::{ConnectionState, LiveMetricsClient, MetricsHandle, MetricsView};
pub use relay_common::{
    normalize, Frame, LiveMetricsConfig, MetricsError, MetricsSnapshot, TransportPolicy,
};
