//! HTTP status server using axum.
//!
//! Read-only: serves the latest ladder snapshot published by the runner and
//! the Prometheus registry.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use grid_engine::LadderSnapshot;
use grid_telemetry::Metrics;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppResult;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct StatusState {
    snapshot_rx: watch::Receiver<LadderSnapshot>,
}

impl StatusState {
    pub fn new(snapshot_rx: watch::Receiver<LadderSnapshot>) -> Self {
        Self { snapshot_rx }
    }
}

pub fn create_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/snapshot", get(get_snapshot))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn get_snapshot(State(state): State<StatusState>) -> Json<LadderSnapshot> {
    Json(state.snapshot_rx.borrow().clone())
}

async fn get_metrics() -> Response {
    match Metrics::render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

/// Serve until the token is cancelled.
pub async fn run_server(
    port: u16,
    snapshot_rx: watch::Receiver<LadderSnapshot>,
    shutdown_token: CancellationToken,
) -> AppResult<()> {
    let app = create_router(StatusState::new(snapshot_rx));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "Status server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;

    info!("Status server stopped");
    Ok(())
}
