//! Metrics scrape and status inspection handlers

use crate::{error::Result, models::ApiResponse, AppState};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::debug;

pub async fn handle_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    debug!("GET /metrics - {} probes with a status", state.status.len());

    let body = state.exporter.render()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, state.exporter.content_type())],
        body,
    ))
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    debug!("GET /api/status - Probe status snapshot");

    let probes = state.status.snapshot();
    let down = probes.iter().filter(|p| p.value == 0).count();

    Json(ApiResponse::success(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "probe_count": probes.len(),
        "down_count": down,
        "probes": probes,
    })))
}
