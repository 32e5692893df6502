//! Fan-out service binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                  FAN-OUT SERVICE                   │
//!                        │                                                    │
//!     POST /process      │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//!     ───────────────────┼─▶│ context  │──▶│  http    │──▶│ orchestrator │   │
//!                        │  │ tracer   │   │ handlers │   │   (JoinSet)  │   │
//!                        │  └──────────┘   └──────────┘   └──────┬───────┘   │
//!                        │                                       │ N calls    │
//!                        │                                       ▼            │
//!                        │                              ┌────────────────┐    │
//!                        │                              │ OutboundClient │────┼──▶ Upstreams
//!                        │                              │ timeout/retry  │    │
//!                        │                              └────────────────┘    │
//!                        │                                                    │
//!                        │   errors::ErrorTranslator  ·  observability  ·  lifecycle
//!                        └───────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fanout_service::config::load_config;
use fanout_service::http::HttpServer;
use fanout_service::lifecycle::{signals, Shutdown};
use fanout_service::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "fanout-service")]
#[command(about = "Concurrent fan-out over HTTP dependencies with per-call timeouts and retries", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "FANOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    if cli.check {
        println!("configuration OK ({} upstreams)", config.upstreams.len());
        return Ok(());
    }

    logging::init_logging(&config.observability);

    tracing::info!(
        service = %config.service.name,
        version = %config.service.version,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown));

    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
