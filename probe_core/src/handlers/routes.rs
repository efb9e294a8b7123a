//! Route table of the monitoring server

use crate::AppState;
use axum::{routing::get, Router};

use super::health::handle_healthz;
use super::metrics::{handle_metrics, handle_status};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/healthz", get(handle_healthz))
        .route("/api/status", get(handle_status))
}
