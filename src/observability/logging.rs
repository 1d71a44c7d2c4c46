//! Logging bootstrap.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber (pretty or JSON)
//! - Build the process-wide `Logger` the correlator derives from
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured filter
//! - Subscriber init is idempotent so tests and embedders can call it freely

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig, SinkKind};
use crate::observability::logger::{Level, Logger, ParseLevelError};
use crate::observability::sink::{JsonSink, TracingSink};

/// Install the global `tracing` subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

/// Build the process-wide request logger from config.
pub fn build_logger(config: &LoggingConfig) -> Result<Logger, ParseLevelError> {
    let level: Level = config.level.parse()?;
    let builder = Logger::builder(config.name.clone()).level(level);

    let logger = match config.sink {
        SinkKind::Tracing => builder.sink(TracingSink).build(),
        SinkKind::Stdout => builder.sink(JsonSink::stdout()).build(),
    };

    Ok(logger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_from_config() {
        let mut config = LoggingConfig::default();
        config.name = "api".into();
        config.level = "debug".into();

        let logger = build_logger(&config).unwrap();
        assert_eq!(logger.fields()["name"], "api");
        assert_eq!(logger.level(), Level::Debug);
    }

    #[test]
    fn bad_level_is_rejected() {
        let mut config = LoggingConfig::default();
        config.level = "verbose".into();
        assert!(build_logger(&config).is_err());
    }

    #[test]
    fn second_init_reports_false() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
