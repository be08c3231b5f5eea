use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::AdminState;
use crate::traffic::TargetSpec;

/// Content type of the Prometheus text exposition format.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub targets: usize,
}

pub async fn get_metrics(State(state): State<AdminState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        uptime_secs: state.started.elapsed().as_secs(),
        targets: state.targets.len(),
    })
}

pub async fn get_targets(State(state): State<AdminState>) -> Json<Vec<TargetSpec>> {
    Json(state.targets.as_ref().clone())
}
