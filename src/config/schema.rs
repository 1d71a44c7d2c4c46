//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};

use crate::http::request::{DEFAULT_ORIGIN, X_REQUEST_ID};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Request correlation settings.
    pub correlation: CorrelationConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Correlation middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Label stamped on every lifecycle record as `origin`.
    pub origin: String,

    /// Response header carrying a newly generated identifier.
    pub header_name: String,

    /// Reuse the inbound `header_name` value as the identifier.
    /// Only enable behind a proxy that sets or strips this header.
    pub trust_inbound_header: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            header_name: X_REQUEST_ID.to_string(),
            trust_inbound_header: false,
        }
    }
}

/// Output format of the `tracing` fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Where the request logger writes its records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Forward to the `tracing` subscriber.
    #[default]
    Tracing,
    /// Raw JSON lines on stdout.
    Stdout,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logger name, emitted as the `name` field.
    pub name: String,

    /// Minimum record level (trace, debug, info, warn, error).
    pub level: String,

    /// Subscriber output format.
    pub format: LogFormat,

    /// Request logger destination.
    pub sink: SinkKind,

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            level: "info".to_string(),
            format: LogFormat::Pretty,
            sink: SinkKind::Tracing,
            filter: "request_correlator=info,tower_http=info".to_string(),
        }
    }
}
