//! Administrative HTTP API.
//!
//! # Routes
//! - `GET /metrics`: Prometheus text exposition of the client metrics
//! - `GET /status`: version and uptime
//! - `GET /targets`: targets as resolved at startup
//!
//! # Design Decisions
//! - Runs as a background task; its failure is logged, never fatal to traffic
//! - Read-only: nothing here changes the running engine

pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::observability::MetricsRegistry;
use crate::traffic::TargetSpec;
use self::handlers::*;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub metrics: MetricsRegistry,
    pub targets: Arc<Vec<TargetSpec>>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(metrics: MetricsRegistry, targets: Vec<TargetSpec>) -> Self {
        Self {
            metrics,
            targets: Arc::new(targets),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/status", get(get_status))
        .route("/targets", get(get_targets))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `listener` until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
