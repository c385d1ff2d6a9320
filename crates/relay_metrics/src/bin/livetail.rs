//! relay-livetail - follow live gateway metrics from a terminal.
//!
//! Small diagnostic consumer of the live-metrics client: connects with
//! the configured policy and logs each view change until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use relay_metrics::{
    ConnectionState, LiveMetricsClient, LiveMetricsConfig, MetricsHandle, TransportPolicy,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relay-livetail", about = "Tail live gateway metrics")]
struct Args {
    /// Optional TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Telemetry backend origin
    #[arg(long)]
    base_url: Option<String>,

    /// Reconnection policy: retry-push or push-then-poll
    #[arg(long)]
    transport: Option<TransportPolicy>,

    /// Delay before a push reconnection attempt, in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Interval between poll fetches, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> LiveMetricsConfig {
        let mut config = match &self.config {
            Some(path) => LiveMetricsConfig::load(path),
            None => LiveMetricsConfig::default(),
        };
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_delay_ms = ms;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    info!(
        "relay-livetail v{} connecting to {} (policy {})",
        env!("CARGO_PKG_VERSION"),
        config.base_url,
        config.transport
    );

    let client = LiveMetricsClient::connect(config);
    let handle = client.handle();

    tokio::select! {
        _ = tail(handle) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    client.close();
    Ok(())
}

async fn tail(mut handle: MetricsHandle) {
    while handle.changed().await {
        let view = handle.view();
        if let Some(error) = &view.error {
            warn!("Error surfaced: {}", error);
        }
        match (&view.data, view.state) {
            (Some(snapshot), state) => info!(
                "[{:?}] {} req, {:.1} ms avg, {:.2}% errors, uptime {:.2}% ({} open breakers)",
                state,
                snapshot.summary.total_requests,
                snapshot.summary.avg_latency,
                snapshot.summary.error_rate,
                snapshot.summary.uptime,
                snapshot.circuit_breakers.open
            ),
            (None, ConnectionState::Connecting) => info!("Connecting..."),
            (None, state) => info!("[{:?}] no data yet", state),
        }
    }
}
