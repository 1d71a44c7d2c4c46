//! request-correlator demo server
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ──▶ CorrelationLayer ──▶ handler
//!                                     │  req_id, origin
//!                                     │  "start of the request"
//!                                     ▼
//!     Client Response                CompletionBody
//!     ◀────────────── X-Request-ID ◀─ "end of the request" + duration
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_correlator::config::{load_config, AppConfig, LogFormat};
use request_correlator::observability::logging::{build_logger, init_tracing};
use request_correlator::HttpServer;

#[derive(Parser)]
#[command(name = "request-correlator")]
#[command(about = "HTTP server with request correlation logging", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override logging.format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    init_tracing(&config.logging);
    tracing::info!("request-correlator v{} starting", env!("CARGO_PKG_VERSION"));

    let logger = build_logger(&config.logging)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.correlation.origin,
        header = %config.correlation.header_name,
        trust_inbound_header = config.correlation.trust_inbound_header,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, logger)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
