//! Liveness endpoint

use axum::{http::StatusCode, response::IntoResponse};

/// Always `200 OK` while the process serves requests, whatever the probes report.
pub async fn handle_healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
