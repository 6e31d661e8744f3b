use std::{
    future,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use silentrelay::{Config, Relay, app};
use tokio::{net::TcpListener, time};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_REASON: &str = "server shutting down";

/// Time left for writer tasks to flush close frames before the runtime stops.
const CLOSE_FLUSH: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("failed to load config")?;
    let relay = Arc::new(Relay::new(config.relay));

    if let Some(max_idle) = config.idle_timeout {
        info!(?max_idle, "idle sweep enabled");
        tokio::spawn(sweep_idle(relay.clone(), max_idle));
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %config.bind, "signaling relay listening");

    axum::serve(listener, app(relay.clone()))
        .with_graceful_shutdown(shutdown_signal(relay))
        .await?;

    time::sleep(CLOSE_FLUSH).await;
    Ok(())
}

async fn sweep_idle(relay: Arc<Relay>, max_idle: Duration) {
    let mut interval = time::interval(max_idle / 2);
    loop {
        interval.tick().await;
        let evicted = relay.evict_idle(Instant::now(), max_idle);
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted idle peers");
        }
    }
}

async fn shutdown_signal(relay: Arc<Relay>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        future::pending::<()>().await;
    }

    let closed = relay.shutdown(SHUTDOWN_REASON);
    info!(closed, "shutting down");
}
