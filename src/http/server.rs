//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with the demo handlers
//! - Wire up middleware (tower-http trace, request correlation)
//! - Serve on a listener until shutdown

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::http::correlator::{Correlator, CorrelatorError};
use crate::http::request::{CorrelationId, RequestLogger};
use crate::observability::{Fields, Logger};

/// Demo HTTP server with request correlation installed.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server; fails if the correlator cannot be configured.
    pub fn new(config: &AppConfig, logger: Logger) -> Result<Self, CorrelatorError> {
        let correlator = Correlator::builder()
            .logger(logger)
            .config(&config.correlation)
            .build()?;

        let router = Self::build_router(&correlator);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(correlator: &Correlator) -> Router {
        Router::new()
            .route("/", get(hello).post(create))
            .route("/whoami", get(whoami))
            .layer(correlator.layer())
            .layer(TraceLayer::new_for_http())
    }

    /// The configured router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn hello() -> &'static str {
    "Hello World"
}

async fn create(body: Bytes) -> impl IntoResponse {
    tracing::debug!(bytes = body.len(), "Create request received");
    StatusCode::CREATED
}

async fn whoami(
    Extension(id): Extension<CorrelationId>,
    Extension(log): Extension<RequestLogger>,
) -> impl IntoResponse {
    log.info(Fields::new(), "whoami");
    Json(json!({ "req_id": id.as_str() }))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
