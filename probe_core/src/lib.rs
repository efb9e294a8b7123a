//! Core library of the probe monitor: probe executors, their scheduler, the shared
//! status sink and the HTTP endpoints exposing it.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod probes;
pub mod scheduler;
pub mod status;

pub use config::{AppConfig, ProbeConfig, ResolvedProbe};
pub use error::{AppError, Result};
pub use handlers::routes::create_routes;
pub use metrics::MetricsExporter;
pub use probes::{HttpProbe, PingProbe, Probe, ProbeKind, ProbeResult, RawTcpProbe};
pub use scheduler::{ProbeTask, Scheduler};
pub use status::{ProbeStatus, StatusSink};

use axum::Router;
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub status: StatusSink,
    pub exporter: MetricsExporter,
}

impl AppState {
    pub fn new(status: StatusSink) -> Result<Self> {
        let exporter = MetricsExporter::new(status.clone())?;

        Ok(Self {
            app_name: "probe-monitor".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status,
            exporter,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let router = Router::new().merge(create_routes()).with_state(state);
    middleware::logging::with_request_logging(router)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
