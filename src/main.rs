//! Overload guard
//!
//! An HTTP service that shields a slow, failure-prone backend with one of
//! three overload-control strategies.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ http server ──▶ rate limit (optional) ──▶ strategy ──▶ unstable backend
//!                                  │                      │
//!                                  ▼                      ├─ circuit breaker (fallback when tripped)
//!                            429 Limit exceeded           ├─ queue (429 when full, N workers)
//!                                                         └─ direct
//!
//!     Cross-cutting: config (TOML) · observability (tracing, metrics) · lifecycle (shutdown)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use overload_guard::config::{load_config, validate_config, ConfigError, GuardConfig, StrategyKind};
use overload_guard::observability::{logging, metrics};
use overload_guard::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "overload-guard")]
#[command(about = "HTTP overload control in front of an unstable backend", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured strategy (circuit-breaker, queue, rate-limit).
    #[arg(short, long)]
    strategy: Option<StrategyKind>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut GuardConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config(path),
        None => Ok(GuardConfig::default()),
    };
    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_default();
    logging::init_logging(&observability)?;

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    cli.apply(&mut config);
    if let Err(errors) = validate_config(&config) {
        let e = ConfigError::Validation(errors);
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        strategy = config.strategy.as_str(),
        bind_address = %config.listener.bind_address,
        "overload-guard starting"
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move { signal.trigger_on_signal().await });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
