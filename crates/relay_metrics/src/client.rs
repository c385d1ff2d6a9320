//! Connection state machine and the public reactive handle.
//!
//! A single driver task exclusively owns the active transport, the
//! per-transport event channel, and the one optional retry timer. All
//! externally visible state flows through a watch channel, so consumers
//! read a consistent view and can await changes. Invariants held here:
//! at most one transport active, at most one timer pending, and no
//! published update after teardown.

use crate::poll::Poller;
use crate::sse::PushConnection;
use relay_common::{LiveMetricsConfig, MetricsError, MetricsSnapshot, TransportPolicy};

use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

/// Lifecycle of the metrics connection, rebuilt from scratch per view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Error,
    PollingFallback,
}

/// Everything a consumer can observe. `data` is the last-known-good
/// snapshot and survives errors; `connected` reports push-channel
/// liveness (false while polling).
#[derive(Debug, Clone)]
pub struct MetricsView {
    pub data: Option<MetricsSnapshot>,
    pub state: ConnectionState,
    pub connected: bool,
    pub error: Option<MetricsError>,
}

impl Default for MetricsView {
    fn default() -> Self {
        Self {
            data: None,
            state: ConnectionState::Idle,
            connected: false,
            error: None,
        }
    }
}

/// Events delivered by the active transport to the driver.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// Push handshake acknowledged; no data carried.
    Connected { client_id: String },
    /// A normalized telemetry snapshot from either transport.
    Snapshot(MetricsSnapshot),
    /// Non-fatal: the transport stays up.
    Error(MetricsError),
    /// Terminal: the transport closed itself. Sent exactly once.
    Closed(MetricsError),
}

enum Command {
    Reconnect,
}

enum ActiveTransport {
    None,
    Push(PushConnection),
    Polling(Poller),
}

/// Cloneable consumer handle: the sole surface rendering code reads.
#[derive(Clone)]
pub struct MetricsHandle {
    view_rx: watch::Receiver<MetricsView>,
    cmd_tx: mpsc::Sender<Command>,
}

impl MetricsHandle {
    /// Current view (cheap clone of the watched value).
    pub fn view(&self) -> MetricsView {
        self.view_rx.borrow().clone()
    }

    /// Wait for the next published change. Returns false once the client
    /// has been torn down.
    pub async fn changed(&mut self) -> bool {
        self.view_rx.changed().await.is_ok()
    }

    /// Tear down whatever transport is active and restart from push.
    /// Always safe to call, including repeatedly.
    pub fn reconnect(&self) {
        // A full command queue already holds a pending reconnect.
        let _ = self.cmd_tx.try_send(Command::Reconnect);
    }
}

/// Owner of the connection lifecycle. Dropping it (or calling `close`)
/// tears everything down; no handle observes an update afterwards.
pub struct LiveMetricsClient {
    view_rx: watch::Receiver<MetricsView>,
    cmd_tx: mpsc::Sender<Command>,
    driver: JoinHandle<()>,
}

impl LiveMetricsClient {
    /// Spawn the driver and begin connecting over push.
    pub fn connect(config: LiveMetricsConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (view_tx, view_rx) = watch::channel(MetricsView::default());

        let driver = tokio::spawn(Driver::new(config, view_tx, cmd_rx).run());

        Self {
            view_rx,
            cmd_tx,
            driver,
        }
    }

    pub fn handle(&self) -> MetricsHandle {
        MetricsHandle {
            view_rx: self.view_rx.clone(),
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Idempotent, synchronous teardown: aborts the driver, which drops
    /// the transports and timers it owns. Guarantees zero further
    /// published updates.
    pub fn close(&self) {
        self.driver.abort();
    }
}

impl Drop for LiveMetricsClient {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

struct Driver {
    config: LiveMetricsConfig,
    http: reqwest::Client,
    view_tx: watch::Sender<MetricsView>,
    cmd_rx: mpsc::Receiver<Command>,
    /// Receiving end of the current transport's event channel. Replaced
    /// wholesale on every transport switch, so events from a superseded
    /// transport are dropped with the old receiver.
    events: Option<mpsc::Receiver<TransportEvent>>,
    transport: ActiveTransport,
    /// The single retry-timer slot.
    retry: Option<Pin<Box<Sleep>>>,
}

enum Step {
    Command(Option<Command>),
    Event(Option<TransportEvent>),
    RetryFired,
}

impl Driver {
    fn new(
        config: LiveMetricsConfig,
        view_tx: watch::Sender<MetricsView>,
        cmd_rx: mpsc::Receiver<Command>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            config,
            http,
            view_tx,
            cmd_rx,
            events: None,
            transport: ActiveTransport::None,
            retry: None,
        }
    }

    async fn run(mut self) {
        self.connect_push();

        loop {
            let has_events = self.events.is_some();
            let has_retry = self.retry.is_some();

            let step = tokio::select! {
                cmd = self.cmd_rx.recv() => Step::Command(cmd),
                ev = Self::next_event(&mut self.events), if has_events => Step::Event(ev),
                _ = Self::retry_elapsed(&mut self.retry), if has_retry => Step::RetryFired,
            };

            match step {
                Step::Command(Some(Command::Reconnect)) => {
                    info!("Reconnect requested");
                    self.retry = None;
                    self.connect_push();
                }
                Step::Command(None) => {
                    // Client dropped; the driver is being torn down.
                    self.teardown();
                    return;
                }
                Step::Event(Some(event)) => self.on_event(event),
                Step::Event(None) => {
                    // Transport task exited; terminal Closed was already
                    // handled or the transport was superseded.
                    self.events = None;
                }
                Step::RetryFired => {
                    self.retry = None;
                    debug!("Retry timer elapsed, attempting push connect");
                    self.connect_push();
                }
            }
        }
    }

    async fn next_event(
        events: &mut Option<mpsc::Receiver<TransportEvent>>,
    ) -> Option<TransportEvent> {
        match events {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
        match retry {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending().await,
        }
    }

    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { client_id } => {
                info!("Push stream open (client {})", client_id);
                self.view_tx.send_modify(|v| {
                    v.state = ConnectionState::Open;
                    v.connected = true;
                    v.error = None;
                });
            }
            TransportEvent::Snapshot(snapshot) => {
                // Wholesale replacement; a good snapshot clears the error.
                self.view_tx.send_modify(|v| {
                    v.data = Some(snapshot);
                    v.error = None;
                });
            }
            TransportEvent::Error(error) => {
                // Non-fatal: the transport stays up, last data stays shown.
                self.view_tx.send_modify(|v| v.error = Some(error));
            }
            TransportEvent::Closed(error) => self.on_transport_down(error),
        }
    }

    /// Push transport failed. The poller never emits `Closed`, so this is
    /// always a push failure; apply the configured reconnection policy.
    fn on_transport_down(&mut self, error: MetricsError) {
        self.drop_transport();

        match self.config.transport {
            TransportPolicy::RetryPush => {
                let delay = self.config.retry_delay();
                warn!("Push transport down ({}), retrying in {:?}", error, delay);
                self.view_tx.send_modify(|v| {
                    v.state = ConnectionState::Error;
                    v.connected = false;
                    v.error = Some(error);
                });
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            TransportPolicy::PushThenPoll => {
                warn!("Push transport down ({}), falling back to polling", error);
                self.view_tx.send_modify(|v| {
                    v.connected = false;
                    v.error = Some(error);
                });
                self.start_polling();
            }
        }
    }

    fn connect_push(&mut self) {
        self.drop_transport();
        self.view_tx.send_modify(|v| {
            v.state = ConnectionState::Connecting;
            v.connected = false;
        });

        let (tx, rx) = mpsc::channel(32);
        self.events = Some(rx);
        self.transport = ActiveTransport::Push(PushConnection::open(
            self.http.clone(),
            self.config.stream_url(),
            tx,
        ));
    }

    fn start_polling(&mut self) {
        self.drop_transport();
        self.view_tx
            .send_modify(|v| v.state = ConnectionState::PollingFallback);

        let (tx, rx) = mpsc::channel(32);
        self.events = Some(rx);
        self.transport = ActiveTransport::Polling(Poller::start(
            self.http.clone(),
            self.config.poll_url(),
            self.config.poll_interval(),
            tx,
        ));
    }

    /// Close the active transport and drop its event channel. Leaves the
    /// driver with no transport, no events, and untouched retry slot.
    fn drop_transport(&mut self) {
        match &mut self.transport {
            ActiveTransport::Push(conn) => conn.close(),
            ActiveTransport::Polling(poller) => poller.stop(),
            ActiveTransport::None => {}
        }
        self.transport = ActiveTransport::None;
        self.events = None;
    }

    fn teardown(&mut self) {
        debug!("Driver teardown");
        self.retry = None;
        self.drop_transport();
    }
}
