//! orderbridge - commerce back office service
//!
//! Main entry point: load configuration, wire the context, serve HTTP.

use std::sync::Arc;

use anyhow::Context as _;
use orderbridge_api::utils::logging::init_tracing;
use orderbridge_api::{router, AppContext};
use orderbridge_infra::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load().context("failed to load configuration")?;
    init_tracing(config.server.log_json);

    let bind_address = config.server.bind_address.clone();
    let ctx = Arc::new(AppContext::new(config).await.context("failed to build application context")?);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!(address = %bind_address, "orderbridge listening");

    axum::serve(listener, router(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("shutting down background work");
    ctx.shutdown().await.context("shutdown failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
}
