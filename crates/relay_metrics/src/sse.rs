//! Push transport: one persistent server-sent-events connection.
//!
//! The connection is owned by a spawned reader task that decodes discrete
//! frames from the byte stream and forwards them as [`TransportEvent`]s
//! over an mpsc channel. The state machine owns the receiving end; when
//! it drops the receiver (teardown or transport switch) the task exits on
//! its next send, so no event is ever delivered to a stale consumer.

use crate::client::TransportEvent;
use relay_common::{normalize, Frame, MetricsError};

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Incremental decoder for the SSE wire format: frames are separated by a
/// blank line and carry one or more `data:` lines; `event:`, `id:`,
/// `retry:` fields and `:` comments are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// Feed a chunk of bytes; returns the data payloads of every frame
    /// completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(chunk).replace('\r', "");
        self.buffer.push_str(&text);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..pos + 2).collect();
            if let Some(data) = Self::extract_data(&frame) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Join the `data:` lines of one frame; None for heartbeat/comment
    /// frames that carry no data.
    fn extract_data(frame: &str) -> Option<String> {
        let mut lines = Vec::new();
        for line in frame.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Handle to one open push connection. Dropping or closing it aborts the
/// reader task; `close` is idempotent.
#[derive(Debug)]
pub(crate) struct PushConnection {
    task: JoinHandle<()>,
}

impl PushConnection {
    /// Establish one push connection, feeding events into `tx`.
    pub(crate) fn open(
        http: reqwest::Client,
        url: String,
        tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let task = tokio::spawn(run_stream(http, url, tx));
        Self { task }
    }

    /// Synchronous, idempotent teardown.
    pub(crate) fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for PushConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reader loop for one connection. Reports exactly one terminal `Closed`
/// event on transport failure or stream end, then returns.
async fn run_stream(http: reqwest::Client, url: String, tx: mpsc::Sender<TransportEvent>) {
    debug!("Opening push stream: {}", url);

    let response = match http
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            let _ = tx
                .send(TransportEvent::Closed(MetricsError::transport(e)))
                .await;
            return;
        }
    };

    if !response.status().is_success() {
        let _ = tx
            .send(TransportEvent::Closed(MetricsError::Transport(format!(
                "push endpoint returned {}",
                response.status()
            ))))
            .await;
        return;
    }

    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx
                    .send(TransportEvent::Closed(MetricsError::transport(e)))
                    .await;
                return;
            }
        };

        for payload in decoder.push(&bytes) {
            let event = match Frame::parse(&payload) {
                Ok(Frame::Handshake { client_id }) => {
                    debug!("Push handshake acknowledged (client {})", client_id);
                    TransportEvent::Connected { client_id }
                }
                Ok(Frame::ServerError { message }) => {
                    warn!("Server-signaled error on push stream: {}", message);
                    TransportEvent::Error(MetricsError::ServerSignaled(message))
                }
                Ok(Frame::Telemetry(value)) => TransportEvent::Snapshot(normalize(&value)),
                Err(e) => {
                    warn!("Unparseable push frame: {}", e);
                    TransportEvent::Error(e)
                }
            };
            if tx.send(event).await.is_err() {
                return; // receiver dropped, transport superseded
            }
        }
    }

    // Server ended the stream; an abrupt close is a transport failure.
    let _ = tx
        .send(TransportEvent::Closed(MetricsError::Transport(
            "push stream ended".to_string(),
        )))
        .await;
}
