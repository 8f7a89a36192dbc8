//! rr-balancer: round-robin HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http::server ──▶ routing::RequestRouter ──▶ Backend forwarder ──▶ Upstream
//!                                  │        ▲
//!                                  ▼        │ retry same peer / mark dead and re-select
//!                          load_balancer::ServerPool
//!                                  ▲
//!                                  │ set_alive
//!                          health::HealthChecker ── probes ──────────────────────▶ Upstream
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rr_balancer::config::{self, validation::split_backend_list, BalancerConfig};
use rr_balancer::http::HttpServer;
use rr_balancer::lifecycle::{signals, Shutdown};
use rr_balancer::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "rr-balancer")]
#[command(about = "Round-robin HTTP load balancer with health checks and failover", long_about = None)]
struct Cli {
    /// Load balanced backends, use commas to separate
    #[arg(short, long)]
    backends: Option<String>,

    /// Port to serve
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Load the file (if any) and layer command-line values on top.
    fn into_config(self) -> Result<BalancerConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => BalancerConfig::default(),
        };

        if let Some(list) = self.backends {
            config.backends = split_backend_list(&list);
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_tracing(&config.observability.log_level);
    tracing::info!("rr-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    let config = server.config();

    tracing::info!(
        port = config.listener.port,
        backends = config.backends.len(),
        max_attempts = config.retries.max_attempts,
        max_retries = config.retries.max_retries,
        health_check_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.socket_address()).await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, signal).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
