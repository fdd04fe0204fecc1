//! API inlet server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing::resolver ──▶ payload::prepare
//!                                                                  │
//!                                                                  ▼
//!                                                     executor (one task per API)
//!                                                                  │
//!     Client Response                                              ▼
//!     ◀────────────── http::response ◀── render::renderer ◀── payload::aggregate
//!
//!     Cross-cutting: config, security (CORS, headers, signing),
//!                    observability, lifecycle
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use api_inlet::config::load_config;
use api_inlet::executor::HttpStageExecutor;
use api_inlet::http::HttpServer;
use api_inlet::lifecycle::{build_state, signals, Shutdown};
use api_inlet::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "api-inlet", version, about = "HTTP API inlet")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "conf/inlet.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    init_logging(&config.observability);
    tracing::info!(config = %args.config.display(), "api-inlet v0.1.0 starting");

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

    let executor = Arc::new(HttpStageExecutor::new(Duration::from_millis(config.executor.timeout_ms)));
    let state = build_state(&config, executor)?;

    tracing::info!(
        bind_address = %config.http.bind_address,
        base_path = %config.http.path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.http.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    let server = HttpServer::new(&config, state);
    server.run(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
