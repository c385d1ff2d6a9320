//! Polling fallback: timer-driven pull loop against the live endpoint.
//!
//! Every tick is independent: a failed fetch reports an error event but
//! never cancels the timer. The loop runs in a spawned task owned by the
//! state machine; stopping it aborts the task, cancelling any in-flight
//! fetch at its await point so a superseded response is never applied.

use crate::client::TransportEvent;
use relay_common::{normalize, MetricsError, MetricsSnapshot};

use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Handle to a running poll loop. Dropping or stopping it aborts the task.
#[derive(Debug)]
pub(crate) struct Poller {
    task: JoinHandle<()>,
}

impl Poller {
    /// Start polling: one immediate fetch, then one per `interval`.
    pub(crate) fn start(
        http: reqwest::Client,
        url: String,
        interval: Duration,
        tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let task = tokio::spawn(run_poll(http, url, interval, tx));
        Self { task }
    }

    /// Synchronous, idempotent teardown.
    pub(crate) fn stop(&mut self) {
        self.task.abort();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_poll(
    http: reqwest::Client,
    url: String,
    interval: Duration,
    tx: mpsc::Sender<TransportEvent>,
) {
    debug!("Polling fallback active: {} every {:?}", url, interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await; // first tick fires immediately

        let event = match fetch_once(&http, &url, interval).await {
            Ok(snapshot) => TransportEvent::Snapshot(snapshot),
            Err(e) => {
                warn!("Poll tick failed: {}", e);
                TransportEvent::Error(e)
            }
        };
        if tx.send(event).await.is_err() {
            return; // receiver dropped, transport superseded
        }
    }
}

/// One poll fetch. The request timeout equals the interval, so a slow
/// response never overlaps the next tick.
async fn fetch_once(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<MetricsSnapshot, MetricsError> {
    let response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(MetricsError::transport)?;

    if !response.status().is_success() {
        return Err(MetricsError::Transport(format!(
            "poll endpoint returned {}",
            response.status()
        )));
    }

    let body: Value = response.json().await.map_err(MetricsError::protocol)?;
    Ok(normalize(unwrap_envelope(&body)))
}

/// The backend optionally wraps the payload as `{ data: <payload> }`.
fn unwrap_envelope(body: &Value) -> &Value {
    body.get("data").unwrap_or(body)
}
