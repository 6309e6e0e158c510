//! Compliance API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    GATEWAY                       │
//!   Client Request       │  ┌────────┐    ┌──────────┐    ┌─────────────┐   │
//!   ─────────────────────┼─▶│  http  │───▶│ context  │───▶│   forward   │───┼──▶ Upstream
//!                        │  │ routes │    │ resolver │    │  forwarder  │   │    /v1 API
//!                        │  └────────┘    └────┬─────┘    └──────┬──────┘   │
//!                        │                     │ 401/400         │          │
//!   Client Response      │                     ▼                 ▼          │
//!   ◀────────────────────┼──────────── {"error"} / relayed status + body    │
//!                        │                                                  │
//!                        │  config (TOML + env, hot reload) · observability │
//!                        │  lifecycle (signals, graceful shutdown)          │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use comp_gateway::config::loader::{default_config, load_config};
use comp_gateway::config::watcher::ConfigWatcher;
use comp_gateway::lifecycle::{signals, Shutdown};
use comp_gateway::observability::{logging, metrics};
use comp_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "comp-gateway")]
#[command(about = "Authenticated API gateway for the compliance platform", long_about = None)]
struct Args {
    /// Path to a TOML config file. Watched for changes when given.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "comp-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        session_fallback = config.auth.session.is_some(),
        service_key = config.upstream.api_key.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server or events stop.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = GatewayServer::new(&config)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
