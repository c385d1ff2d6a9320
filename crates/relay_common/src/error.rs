//! Error taxonomy for the live-metrics pipeline.
//!
//! All three kinds surface identically through the public handle's
//! `error` field and none of them is fatal: the client always schedules
//! a recovery (retry or fallback) and keeps the last good snapshot.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// Network or connection failure on the push or poll transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unparseable frame or response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An explicit `{type:"error"}` frame from the backend.
    #[error("server-signaled error: {0}")]
    ServerSignaled(String),
}

impl MetricsError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn protocol(err: impl std::fmt::Display) -> Self {
        Self::Protocol(err.to_string())
    }
}
