//! Configuration validation.
//!
//! Serde handles syntax; this checks values. Every problem is reported,
//! not just the first.

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::AppConfig;
use crate::observability::logger::Level;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed config.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("`{}` is not a socket address", config.listener.bind_address),
        });
    }

    if config.correlation.origin.trim().is_empty() {
        errors.push(ValidationError {
            field: "correlation.origin",
            message: "must not be empty".to_string(),
        });
    }

    if HeaderName::from_bytes(config.correlation.header_name.as_bytes()).is_err() {
        errors.push(ValidationError {
            field: "correlation.header_name",
            message: format!("`{}` is not a valid header name", config.correlation.header_name),
        });
    }

    if config.logging.name.trim().is_empty() {
        errors.push(ValidationError {
            field: "logging.name",
            message: "must not be empty".to_string(),
        });
    }

    if let Err(e) = config.logging.level.parse::<Level>() {
        errors.push(ValidationError {
            field: "logging.level",
            message: e.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
