mod error;
pub mod routes;

pub use error::ApiError;

use crate::handler::RequestHandler;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<RequestHandler>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self {
            handler,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/dashboard", get(routes::dashboard))
        .route("/mcp/tools", get(routes::mcp_tools))
        .route("/chat", post(routes::chat))
        .with_state(state)
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        addr = %listener.local_addr()?,
        model = state.handler.provider().model(),
        mcp = %state.handler.server_identifier(),
        "HTTP server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C, serving until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
