//! Request correlation middleware.
//!
//! # Data Flow
//! ```text
//! request
//!     → resolve upstream id, or generate one
//!     → attach CorrelationId, RequestLogger and RequestContext to extensions
//!     → "start of the request" record
//!     → inner service (called synchronously from `call`)
//!     → X-Request-ID on the response when the id was generated here
//!     → body wrapped in CompletionBody → "end of the request" record
//! ```
//!
//! # Design Decisions
//! - Configuration is read-only after `build()`; the service shares it via `Arc`
//! - Per-request state lives in a `RequestScope` value, not in captured closures
//! - A missing logger is a build error, never a silent no-op

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{request, HeaderName, HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::BoxError;
use serde_json::Value;
use tower::{Layer, Service};

use crate::config::CorrelationConfig;
use crate::http::completion::{CompletionBody, CompletionGuard};
use crate::http::request::{
    upstream_id, CorrelationId, IdGenerator, OsRandomIds, RequestContext, RequestLogger,
    DEFAULT_ORIGIN, REQ_ID_FIELD, X_REQUEST_ID,
};
use crate::observability::{Fields, Logger};

/// Message of the start-of-request record.
pub const START_MSG: &str = "start of the request";

/// Errors raised while configuring or running the correlator.
#[derive(Debug, thiserror::Error)]
pub enum CorrelatorError {
    #[error("request correlator requires a process-wide logger")]
    MissingLogger,

    #[error("invalid response header name `{0}`")]
    InvalidHeaderName(String),

    #[error("failed to generate request identifier: {0}")]
    IdGeneration(String),
}

/// Builder for [`Correlator`].
pub struct CorrelatorBuilder {
    logger: Option<Logger>,
    origin: String,
    header_name: String,
    trust_inbound_header: bool,
    ids: Arc<dyn IdGenerator>,
}

impl CorrelatorBuilder {
    fn new() -> Self {
        Self {
            logger: None,
            origin: DEFAULT_ORIGIN.to_string(),
            header_name: X_REQUEST_ID.to_string(),
            trust_inbound_header: false,
            ids: Arc::new(OsRandomIds),
        }
    }

    /// Process-wide logger that request loggers are derived from. Required.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn trust_inbound_header(mut self, trust: bool) -> Self {
        self.trust_inbound_header = trust;
        self
    }

    pub fn id_generator<G: IdGenerator>(mut self, ids: G) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Apply a `[correlation]` config section.
    pub fn config(self, config: &CorrelationConfig) -> Self {
        self.origin(config.origin.clone())
            .header_name(config.header_name.clone())
            .trust_inbound_header(config.trust_inbound_header)
    }

    pub fn build(self) -> Result<Correlator, CorrelatorError> {
        let logger = self.logger.ok_or(CorrelatorError::MissingLogger)?;
        let header_name = HeaderName::from_bytes(self.header_name.as_bytes())
            .map_err(|_| CorrelatorError::InvalidHeaderName(self.header_name.clone()))?;

        Ok(Correlator {
            inner: Arc::new(Inner {
                logger,
                origin: Arc::from(self.origin),
                header_name,
                trust_inbound_header: self.trust_inbound_header,
                ids: self.ids,
            }),
        })
    }
}

struct Inner {
    logger: Logger,
    origin: Arc<str>,
    header_name: HeaderName,
    trust_inbound_header: bool,
    ids: Arc<dyn IdGenerator>,
}

/// Configured correlator. Cheap to clone; shared by every request.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<Inner>,
}

/// Per-request state produced by [`Correlator::begin`].
#[derive(Debug)]
pub struct RequestScope {
    pub context: RequestContext,
    /// Set when the identifier was generated by this correlator.
    pub generated: Option<HeaderValue>,
    guard: CompletionGuard,
}

impl Correlator {
    pub fn builder() -> CorrelatorBuilder {
        CorrelatorBuilder::new()
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.inner.header_name
    }

    pub fn layer(&self) -> CorrelationLayer {
        CorrelationLayer {
            correlator: self.clone(),
        }
    }

    /// Identify the request, attach its context and emit the start record.
    ///
    /// The returned scope must be handed to [`RequestScope::finish`] with the
    /// response; dropping it instead records the request as aborted.
    pub fn begin(&self, parts: &mut request::Parts) -> Result<RequestScope, CorrelatorError> {
        let inner = &self.inner;
        let trusted = inner.trust_inbound_header.then_some(&inner.header_name);

        let (id, generated) = match upstream_id(parts, trusted) {
            Some(id) => (id, None),
            None => {
                let id = inner.ids.generate()?;
                let value = match HeaderValue::from_str(id.as_str()) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(req_id = %id, "Generated id is not a valid header value");
                        None
                    }
                };
                (id, value)
            }
        };

        let mut fields = Fields::new();
        fields.insert(REQ_ID_FIELD.into(), Value::from(id.as_str()));
        fields.insert("origin".into(), Value::from(&*inner.origin));
        let log = inner.logger.child(fields);
        let context = RequestContext {
            id: id.clone(),
            log: RequestLogger::new(log.clone()),
        };

        parts.extensions.insert(id);
        parts.extensions.insert(context.log.clone());
        parts.extensions.insert(context.clone());

        let mut start = Fields::new();
        start.insert("req".into(), (log.serializers().req)(parts));
        log.info(start, START_MSG);

        let guard = CompletionGuard::new(log, Instant::now());

        Ok(RequestScope {
            context,
            generated,
            guard,
        })
    }
}

impl RequestScope {
    pub fn id(&self) -> &CorrelationId {
        &self.context.id
    }

    /// Expose a generated id under `header_name` and arm the end record on
    /// the response body.
    pub fn finish<B>(mut self, header_name: &HeaderName, response: Response<B>) -> Response<Body>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (mut parts, body) = response.into_parts();

        if let Some(value) = self.generated.take() {
            parts.headers.insert(header_name.clone(), value);
        }

        let serializers = *self.context.log.serializers();
        self.guard.set_response((serializers.res)(&parts));

        let body = CompletionBody::new(Body::new(body), self.guard);
        Response::from_parts(parts, Body::new(body))
    }
}

/// Tower layer installing the correlator.
#[derive(Clone)]
pub struct CorrelationLayer {
    correlator: Correlator,
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            correlator: self.correlator.clone(),
        }
    }
}

/// Service produced by [`CorrelationLayer`].
#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
    correlator: Correlator,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: http_body::Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let (mut parts, body) = req.into_parts();
        let scope = match self.correlator.begin(&mut parts) {
            Ok(scope) => scope,
            Err(e) => {
                tracing::error!(error = %e, "Request rejected: no correlation id");
                let response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
                return Box::pin(async move { Ok::<_, S::Error>(response) });
            }
        };

        let header_name = self.correlator.header_name().clone();
        let future = self.inner.call(Request::from_parts(parts, body));

        Box::pin(async move {
            let response = future.await?;
            Ok(scope.finish(&header_name, response))
        })
    }
}
