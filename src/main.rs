//! Admission gate reference server.
//!
//! Serves health and admin endpoints behind the full middleware stack. The
//! configuration file is optional; without it defaults plus `GATE_*`
//! environment variables apply.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ordnung_gate::config::{load_config, load_from_env, ConfigWatcher};
use ordnung_gate::lifecycle::signals;
use ordnung_gate::observability::{logging, metrics};
use ordnung_gate::{GateServer, Shutdown};

#[derive(Parser)]
#[command(name = "ordnung-gate", version, about = "Request admission gate")]
struct Args {
    /// Path to a TOML configuration file (watched for rate limit changes).
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("ordnung-gate v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        calls = config.rate_limit.calls,
        period_secs = config.rate_limit.period_secs,
        auth_calls = config.rate_limit.auth_calls,
        auth_period_secs = config.rate_limit.auth_period_secs,
        environment = ?config.security.environment,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    GateServer::new(config).run(listener, config_updates, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
