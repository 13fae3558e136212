pub mod routes;

use crate::config::Config;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

pub async fn run_server(config: Arc<Config>) -> Result<()> {
    let addr = SocketAddr::from((config.api_host, config.api_port));
    let state = routes::ApiState { config };
    let app: Router = routes::router(state).layer(CorsLayer::permissive());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "OpenMarks API server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}
