//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Correlator / handlers
//!     → logger.rs (Logger, child loggers, LogRecord)
//!     → serializers.rs (req / res / err → JSON)
//!     → sink.rs (tracing events, JSON lines, memory)
//!
//! logging.rs installs the tracing subscriber that TracingSink feeds.
//! ```
//!
//! # Design Decisions
//! - Structured records (JSON) for machine parsing
//! - Correlation id flows through every record as `req_id`
//! - The logger never retries or buffers; transport is the sink's concern

pub mod logger;
pub mod logging;
pub mod serializers;
pub mod sink;

pub use logger::{Fields, Level, LogRecord, Logger, LoggerBuilder};
pub use serializers::Serializers;
pub use sink::{JsonSink, LogSink, MemorySink, TracingSink};
