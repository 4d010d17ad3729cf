pub mod api;
pub mod core;
pub mod providers;

pub use crate::core::config;

use crate::config::AppConfig;
use crate::core::{Pipeline, RatioRequest};
use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

/// Serves the API on an already bound listener until `shutdown` resolves.
pub async fn serve_with_listener<F>(
    listener: TcpListener,
    config: &AppConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = api::AppState::from_config(config)?;
    info!("Gold ratio API listening on {}", listener.local_addr()?);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

pub async fn serve(config_path: Option<&str>, bind: Option<&str>) -> Result<()> {
    info!("Gold ratio server starting...");
    let config = load_config(config_path)?;

    let addr = bind.unwrap_or(&config.server.bind);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    serve_with_listener(listener, &config, shutdown_signal()).await?;
    info!("Gold ratio server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Runs one pipeline outside the server and returns the JSON payload the
/// matching endpoint would respond with.
pub async fn ratio_json(
    pipeline: Pipeline,
    ticker: &str,
    start_date: &str,
    config_path: Option<&str>,
) -> Result<String> {
    let config = load_config(config_path)?;
    let request = RatioRequest::parse(Some(ticker), Some(start_date))?;
    let state = api::AppState::from_config(&config)?;

    let points = pipeline
        .run(state.provider.as_ref(), &state.ratio, &request)
        .await?;
    Ok(serde_json::to_string_pretty(&points)?)
}
