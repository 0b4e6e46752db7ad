use crate::config::RelayConfig;
use crate::signaling::{SignalingService, ws_handler};
use anyhow::Context;
use axum::Router;
use axum::routing::get;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws/{member_id}", get(ws_handler))
        .route("/health", get(health))
        .with_state(service)
}

async fn health() -> &'static str {
    "ok"
}

/// Binds `config.bind` and serves until `shutdown` resolves.
pub async fn run(
    config: RelayConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Relay listening on {}", listener.local_addr()?);

    let service = SignalingService::new(config.heartbeat_interval);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Relay server failed")?;

    info!("Relay stopped");
    Ok(())
}
