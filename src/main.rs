//! Greenlight movies API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace span ─▶ metrics
//!                                                   │
//!                  ┌────────────────────────────────▼──────────────────┐
//!                  │ recover panic ─▶ rate limit ─▶ authenticate        │
//!                  │                                   │                │
//!                  │                     route table ◀─┘                │
//!                  │                         │                          │
//!                  │            permission gate (movies:read/write)     │
//!                  │                         │                          │
//!                  │                      handler ─▶ JSON envelope      │
//!                  └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use greenlight::config::{load_config, validate_config, ApiConfig};
use greenlight::lifecycle::{build_state, signals, Shutdown};
use greenlight::observability::{logging, metrics};
use greenlight::HttpServer;

#[derive(Parser)]
#[command(name = "greenlight")]
#[command(about = "JSON API for managing movie records", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the environment name.
    #[arg(long)]
    env: Option<String>,

    /// Override rate_limit.requests_per_second.
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Override rate_limit.burst_size.
    #[arg(long)]
    limiter_burst: Option<u32>,

    /// Override rate_limit.enabled.
    #[arg(long)]
    limiter_enabled: Option<bool>,
}

impl Cli {
    fn apply(self, config: &mut ApiConfig) {
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(env) = self.env {
            config.environment = env;
        }
        if let Some(rps) = self.limiter_rps {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.rate_limit.burst_size = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.rate_limit.enabled = enabled;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ApiConfig::default(),
    };
    cli.apply(&mut config);

    logging::init_logging(&config.observability.log_filter)?;
    tracing::info!("greenlight v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = %config.environment,
        request_timeout_secs = config.timeouts.request_secs,
        limiter_enabled = config.rate_limit.enabled,
        limiter_rps = config.rate_limit.requests_per_second,
        limiter_burst = config.rate_limit.burst_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let state = build_state(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(config, state).run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
