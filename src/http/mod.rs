//! HTTP request correlation subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware wiring)
//!     → correlator.rs (identify request, scoped logger, start record)
//!     → request.rs (identifier generation, upstream id, RequestLogger)
//!     → handler
//!     → completion.rs (end record once the response body is done)
//!     → Send to client
//! ```

pub mod completion;
pub mod correlator;
pub mod request;
pub mod server;

pub use completion::{CompletionBody, CompletionGuard, Outcome, END_MSG};
pub use correlator::{
    CorrelationLayer, CorrelationService, Correlator, CorrelatorBuilder, CorrelatorError,
    RequestScope, START_MSG,
};
pub use request::{
    CorrelationId, IdGenerator, OsRandomIds, RequestContext, RequestIdExt, RequestLogger,
    DEFAULT_ORIGIN, REQ_ID_FIELD, X_REQUEST_ID,
};
pub use server::HttpServer;
