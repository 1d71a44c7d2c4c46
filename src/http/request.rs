//! Request identification.
//!
//! # Responsibilities
//! - Generate collision-resistant request identifiers (OS CSPRNG, UUID v4 layout)
//! - Resolve an identifier already assigned upstream
//! - Expose the per-request context (identifier + `RequestLogger`) to handlers
//!
//! # Design Decisions
//! - Identifiers carry no host, process or timing information
//! - Generation is stateless; no counters, no locks
//! - A failing random source is an error, never a weaker fallback

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use axum::http::{request, HeaderName, HeaderValue, Request};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::http::CorrelatorError;
use crate::observability::Logger;

/// Conventional request-identifier header.
pub const X_REQUEST_ID: &str = "X-Request-ID";

/// `origin` label used when none is configured.
pub const DEFAULT_ORIGIN: &str = "request";

/// Log field carrying the correlation identifier.
///
/// Part of the log schema: dashboards and queries are built on this name.
pub const REQ_ID_FIELD: &str = "req_id";

/// Opaque per-request correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Source of fresh identifiers.
pub trait IdGenerator: Send + Sync + 'static {
    fn generate(&self) -> Result<CorrelationId, CorrelatorError>;
}

/// 128 bits from the operating system's CSPRNG, rendered as a hyphenated
/// UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomIds;

impl IdGenerator for OsRandomIds {
    fn generate(&self) -> Result<CorrelationId, CorrelatorError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CorrelatorError::IdGeneration(e.to_string()))?;

        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(CorrelationId::new(id.hyphenated().to_string()))
    }
}

/// Logger scoped to one request: carries `req_id` and `origin` as fixed
/// fields on top of the process-wide logger's.
///
/// Inserted into request extensions by the correlator, so handlers can take
/// `Extension<RequestLogger>` directly.
#[derive(Debug, Clone)]
pub struct RequestLogger(Logger);

impl RequestLogger {
    pub fn new(log: Logger) -> Self {
        Self(log)
    }

    pub fn into_inner(self) -> Logger {
        self.0
    }
}

impl Deref for RequestLogger {
    type Target = Logger;

    fn deref(&self) -> &Logger {
        &self.0
    }
}

impl From<RequestLogger> for Logger {
    fn from(log: RequestLogger) -> Self {
        log.0
    }
}

/// Per-request state handlers can read from request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: CorrelationId,
    pub log: RequestLogger,
}

/// Convenience accessors on requests that passed through the correlator.
pub trait RequestIdExt {
    fn correlation_id(&self) -> Option<&CorrelationId>;
    fn request_logger(&self) -> Option<&RequestLogger>;
}

impl<B> RequestIdExt for Request<B> {
    fn correlation_id(&self) -> Option<&CorrelationId> {
        self.extensions().get::<CorrelationId>()
    }

    fn request_logger(&self) -> Option<&RequestLogger> {
        self.extensions().get::<RequestLogger>()
    }
}

/// Identifier assigned before the correlator ran, if any.
///
/// Checked in order: a `CorrelationId` extension, tower-http's `RequestId`
/// extension, then the inbound header when `trusted_header` is given.
pub(crate) fn upstream_id(
    parts: &request::Parts,
    trusted_header: Option<&HeaderName>,
) -> Option<CorrelationId> {
    if let Some(id) = parts.extensions.get::<CorrelationId>() {
        return Some(id.clone());
    }

    if let Some(value) = parts
        .extensions
        .get::<tower_http::request_id::RequestId>()
        .map(|id| id.header_value())
        .filter(|value| !value.is_empty())
    {
        return Some(tower_request_id(value));
    }

    trusted_header
        .and_then(|name| parts.headers.get(name))
        .and_then(|value| value.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(CorrelationId::from)
}

fn tower_request_id(value: &HeaderValue) -> CorrelationId {
    match value.to_str() {
        Ok(id) => CorrelationId::from(id),
        Err(_) => {
            let id = String::from_utf8_lossy(value.as_bytes()).into_owned();
            tracing::warn!(req_id = %id, "Upstream request id is not UTF-8; using a lossy copy");
            CorrelationId::from(id)
        }
    }
}
