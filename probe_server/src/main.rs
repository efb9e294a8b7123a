//! Main entry point for the probe monitor binary

use anyhow::{Context, Result};
use clap::Parser;
use probe_core::config::load_probe_dir;
use probe_core::{create_app, run_server, AppConfig, AppState, Scheduler, StatusSink};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "probe-monitor",
    version,
    about = "Periodic HTTP, ping and TCP probes exported as Prometheus gauges"
)]
struct Cli {
    /// The address to listen on for HTTP requests, e.g. `:8080` or `127.0.0.1:9100`.
    #[arg(long = "listen-address", env = "PROBE_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Directory whose `*.yaml` files hold the probe definitions.
    #[arg(long = "config", env = "PROBE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Enable debug log level
    #[arg(long)]
    debug: bool,

    /// Enable trace log level
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(listen) = &cli.listen_address {
        config
            .apply_listen_address(listen)
            .context("Invalid --listen-address")?;
    }
    if let Some(dir) = &cli.config_dir {
        config.monitoring.config_dir = dir.clone();
    }

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    let probes = load_probe_dir(&config.monitoring.config_dir, config.default_check_interval())
        .context("Fail to load probe config")?;
    info!("Loaded {} probes from {}", probes.len(), config.monitoring.config_dir.display());
    for probe in &probes {
        tracing::trace!("Probe config: {:?}", probe);
    }

    let status = StatusSink::new();
    let state = AppState::new(status.clone()).context("Failed to set up metrics")?;

    let mut scheduler = Scheduler::with_probes(status, &probes);
    scheduler.start();

    let app = create_app(state);
    let served = run_server(app, addr).await;

    scheduler.shutdown().await;
    served.context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.trace {
        "trace"
    } else if cli.debug {
        "debug"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},probe_core={level},tower_http=info",
            env!("CARGO_CRATE_NAME").replace('-', "_"),
            level = default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
