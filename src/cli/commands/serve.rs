use std::sync::Arc;

use anyhow::Context;

use crate::catalog::default_catalog;
use crate::config::AppConfig;
use crate::routes::{app, AppState};
use crate::upstream::HttpUpstream;

pub async fn handle(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        "Starting BFF gateway in {:?} mode, upstream {}",
        config.environment,
        config.upstream.base_url
    );

    let upstream = HttpUpstream::new(&config.upstream).context("failed to build upstream client")?;
    let catalog = default_catalog().context("invalid endpoint catalog")?;
    let bind_addr = config.bind_addr();

    let state = AppState::new(config, Arc::new(upstream), catalog)?;
    let endpoints = state.catalog.len();
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{} with {} endpoints", bind_addr, endpoints);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
