//! Shared test harness: an in-process mock gateway speaking the push
//! (SSE) and pull (JSON) protocols, with scripted connections and hit
//! counters so tests can drive failures deterministically.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::StreamExt;
use relay_metrics::{LiveMetricsConfig, MetricsHandle, MetricsView, TransportPolicy};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;

/// Mock telemetry backend. Push connections must be scripted in advance
/// via [`MockGateway::script_connection`]; an unscripted connection is
/// refused with a 500, which is how tests simulate push being down.
#[derive(Clone, Default)]
pub struct MockGateway {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    push_connects: AtomicUsize,
    poll_requests: AtomicUsize,
    poll_fail_next: AtomicBool,
    scripts: Mutex<VecDeque<mpsc::Receiver<Event>>>,
    poll_payload: Mutex<Value>,
}

impl MockGateway {
    /// Bind on an ephemeral port and serve; returns the base origin.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/api/stream/metrics", get(stream_handler))
            .route("/api/metrics/live", get(poll_handler))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Queue one scripted push connection. The returned sender feeds its
    /// frames; dropping it ends the stream (an abrupt close).
    pub fn script_connection(&self) -> mpsc::Sender<Event> {
        let (tx, rx) = mpsc::channel(16);
        self.inner.scripts.lock().unwrap().push_back(rx);
        tx
    }

    pub fn set_poll_payload(&self, payload: Value) {
        *self.inner.poll_payload.lock().unwrap() = payload;
    }

    /// Make the next poll request fail with a 500.
    pub fn fail_next_poll(&self) {
        self.inner.poll_fail_next.store(true, Ordering::SeqCst);
    }

    pub fn push_connects(&self) -> usize {
        self.inner.push_connects.load(Ordering::SeqCst)
    }

    pub fn poll_requests(&self) -> usize {
        self.inner.poll_requests.load(Ordering::SeqCst)
    }
}

async fn stream_handler(State(gw): State<MockGateway>) -> Response {
    gw.inner.push_connects.fetch_add(1, Ordering::SeqCst);
    let script = gw.inner.scripts.lock().unwrap().pop_front();
    match script {
        Some(rx) => {
            let stream = ReceiverStream::new(rx).map(Ok::<Event, Infallible>);
            Sse::new(stream).into_response()
        }
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn poll_handler(State(gw): State<MockGateway>) -> Response {
    gw.inner.poll_requests.fetch_add(1, Ordering::SeqCst);
    if gw.inner.poll_fail_next.swap(false, Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let payload = gw.inner.poll_payload.lock().unwrap().clone();
    Json(json!({ "data": payload })).into_response()
}

pub fn handshake() -> Event {
    Event::default().data(json!({"type": "connected", "clientId": "it-client"}).to_string())
}

pub fn server_error(message: &str) -> Event {
    Event::default().data(json!({"type": "error", "message": message}).to_string())
}

pub fn telemetry(payload: Value) -> Event {
    Event::default().data(payload.to_string())
}

pub fn raw_frame(data: &str) -> Event {
    Event::default().data(data)
}

/// Short timers so the suites stay fast: 200 ms retry, 150 ms poll.
pub fn test_config(base_url: &str, transport: TransportPolicy) -> LiveMetricsConfig {
    LiveMetricsConfig {
        base_url: base_url.to_string(),
        transport,
        retry_delay_ms: 200,
        poll_interval_ms: 150,
        ..Default::default()
    }
}

/// Poll the handle until the predicate holds, panicking after 5 s.
pub async fn wait_for_view<F>(handle: &MetricsHandle, what: &str, pred: F) -> MetricsView
where
    F: Fn(&MetricsView) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let view = handle.view();
        if pred(&view) {
            return view;
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for {} (last view: {:?})", what, view);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll an arbitrary condition until it holds, panicking after 5 s.
pub async fn wait_until<F>(what: &str, cond: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
