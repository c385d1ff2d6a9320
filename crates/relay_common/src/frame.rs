//! Classification of raw push frames into the known backend shapes.
//!
//! The backend reserves two frame shapes on the push channel; everything
//! else is a telemetry document. Classification is total: any JSON value
//! maps to exactly one variant, and only unparseable bytes are an error.

use crate::error::MetricsError;
use serde_json::Value;

/// One decoded push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `{type:"connected", clientId}` - handshake, carries no data.
    Handshake { client_id: String },
    /// `{type:"error", message}` - non-fatal, the connection stays open.
    ServerError { message: String },
    /// Any other payload is a telemetry document.
    Telemetry(Value),
}

impl Frame {
    /// Parse one frame payload. Invalid JSON is a protocol error; the
    /// caller surfaces it without closing the connection.
    pub fn parse(payload: &str) -> Result<Frame, MetricsError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| MetricsError::Protocol(format!("invalid frame: {}", e)))?;
        Ok(Self::classify(value))
    }

    /// Classify an already-parsed JSON value.
    pub fn classify(value: Value) -> Frame {
        match value.get("type").and_then(Value::as_str) {
            Some("connected") => Frame::Handshake {
                client_id: value
                    .get("clientId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            Some("error") => Frame::ServerError {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified server error")
                    .to_string(),
            },
            _ => Frame::Telemetry(value),
        }
    }
}
