//! Readiness server
//!
//! Serves `GET /v1/readiness` and stops cleanly on SIGINT.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │               READINESS SERVER               │
//!                    │                                              │
//!   Probe request    │  ┌──────────┐   ┌──────────┐   ┌───────────┐ │
//!   ─────────────────┼─▶│   net    │──▶│  http    │──▶│ readiness │ │
//!                    │  │ listener │   │  server  │   │  handler  │ │
//!                    │  └────▲─────┘   └────▲─────┘   └───────────┘ │
//!                    │       │ errors       │ drain                 │
//!                    │  ┌────┴──────────────┴─────┐                 │
//!   SIGINT ──────────┼─▶│  lifecycle coordinator  │                 │
//!                    │  │  signal | error → exit  │                 │
//!                    │  └─────────────────────────┘                 │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use readiness_server::config::{load_config, validate_config, ConfigError, LogFormat, ServiceConfig};
use readiness_server::lifecycle::{signals, Coordinator, Shutdown};
use readiness_server::observability::init_logging;

#[derive(Parser)]
#[command(name = "readiness-server")]
#[command(about = "Readiness probe endpoint with bounded graceful shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log output format, overriding the configuration file.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

fn resolve_config(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind.to_string();
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        "readiness-server starting"
    );

    // Subscribe and register the OS handler before the listener exists.
    let shutdown = Shutdown::new();
    let coordinator = Coordinator::new(config.listener, shutdown.subscribe());
    let _signals = signals::listen(shutdown)?;

    match coordinator.run().await {
        Ok(outcome) => {
            tracing::info!(outcome = ?outcome, "Shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Server terminated abnormally");
            Err(e.into())
        }
    }
}
