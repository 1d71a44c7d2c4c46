//! Request correlation and lifecycle logging for axum/tower services.

pub mod config;
pub mod http;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::{
    CorrelationId, CorrelationLayer, Correlator, CorrelatorError, HttpServer, RequestContext,
    RequestIdExt, RequestLogger,
};
pub use observability::{Logger, MemorySink};
