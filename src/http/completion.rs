//! Exactly-once response completion notification.
//!
//! # Responsibilities
//! - Measure request latency from a monotonic start reading
//! - Emit the "end of the request" record exactly once per request
//!
//! # Design Decisions
//! - The guard rides inside the response body; end-of-stream fires it
//! - Drop fires it too, covering client aborts and discarded bodies
//! - `Option::take` makes a second firing impossible

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};
use serde_json::Value;

use crate::observability::{Fields, Logger};

/// Message of the end-of-request record.
pub const END_MSG: &str = "end of the request";

/// How the response concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The body was fully sent.
    Completed,
    /// The exchange ended early (peer went away, body or future dropped).
    Aborted,
}

struct Pending {
    log: Logger,
    started: Instant,
    res: Option<Value>,
}

/// Single-fire completion hook for one request.
pub struct CompletionGuard {
    pending: Option<Pending>,
}

impl CompletionGuard {
    /// Arm a guard; `started` is the request's start reading.
    pub fn new(log: Logger, started: Instant) -> Self {
        Self {
            pending: Some(Pending {
                log,
                started,
                res: None,
            }),
        }
    }

    /// Attach the serialized response to the end record.
    pub fn set_response(&mut self, res: Value) {
        if let Some(pending) = self.pending.as_mut() {
            pending.res = Some(res);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Emit the end record. Calls after the first are no-ops.
    pub fn fire(&mut self, outcome: Outcome) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let duration = pending.started.elapsed().as_secs_f64() * 1e3;

        let mut fields = Fields::new();
        if let Some(res) = pending.res {
            fields.insert("res".into(), res);
        }
        fields.insert("duration".into(), Value::from(duration));
        fields.insert("aborted".into(), Value::from(outcome == Outcome::Aborted));

        pending.log.info(fields, END_MSG);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.fire(Outcome::Aborted);
    }
}

impl std::fmt::Debug for CompletionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGuard")
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Response body that fires its guard when the stream ends or is dropped.
pub struct CompletionBody {
    inner: Body,
    guard: CompletionGuard,
}

impl CompletionBody {
    pub fn new(inner: Body, guard: CompletionGuard) -> Self {
        Self { inner, guard }
    }
}

impl HttpBody for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let poll = Pin::new(&mut this.inner).poll_frame(cx);
        match &poll {
            Poll::Ready(None) => this.guard.fire(Outcome::Completed),
            Poll::Ready(Some(Err(_))) => this.guard.fire(Outcome::Aborted),
            _ => {}
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CompletionBody {
    fn drop(&mut self) {
        // Servers may skip polling a body that already reports end-of-stream.
        let outcome = if self.inner.is_end_stream() {
            Outcome::Completed
        } else {
            Outcome::Aborted
        };
        self.guard.fire(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemorySink;
    use serde_json::json;

    fn logger() -> (Logger, MemorySink) {
        let sink = MemorySink::new();
        (Logger::builder("test").sink(sink.clone()).build(), sink)
    }

    #[test]
    fn fires_once() {
        let (log, sink) = logger();
        let mut guard = CompletionGuard::new(log, Instant::now());
        guard.set_response(json!({ "statusCode": 200 }));

        guard.fire(Outcome::Completed);
        guard.fire(Outcome::Completed);
        drop(guard);

        let records = sink.with_msg(END_MSG);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("aborted"), Some(&json!(false)));
        assert_eq!(records[0].field("res").unwrap()["statusCode"], 200);
        assert!(records[0].field("duration").unwrap().as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn drop_fires_as_aborted() {
        let (log, sink) = logger();
        let guard = CompletionGuard::new(log, Instant::now());
        drop(guard);

        let records = sink.with_msg(END_MSG);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("aborted"), Some(&json!(true)));
        assert!(records[0].field("res").is_none());
    }

    #[test]
    fn duration_keeps_sub_millisecond_precision() {
        let (log, sink) = logger();
        let started = Instant::now() - std::time::Duration::from_micros(1_500);
        CompletionGuard::new(log, started).fire(Outcome::Completed);

        let duration = sink.records()[0].field("duration").unwrap().as_f64().unwrap();
        assert!(duration >= 1.5, "duration truncated: {duration}");
    }

    #[tokio::test]
    async fn body_fires_on_end_of_stream() {
        let (log, sink) = logger();
        let body = CompletionBody::new(
            Body::from("Hello World"),
            CompletionGuard::new(log, Instant::now()),
        );

        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Hello World");

        let records = sink.with_msg(END_MSG);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("aborted"), Some(&json!(false)));
    }

    #[test]
    fn unread_body_fires_as_aborted() {
        let (log, sink) = logger();
        let body = CompletionBody::new(
            Body::from("never read"),
            CompletionGuard::new(log, Instant::now()),
        );
        assert!(sink.is_empty());
        drop(body);

        let records = sink.with_msg(END_MSG);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("aborted"), Some(&json!(true)));
    }

    #[test]
    fn empty_body_dropped_unpolled_counts_as_completed() {
        let (log, sink) = logger();
        drop(CompletionBody::new(
            Body::empty(),
            CompletionGuard::new(log, Instant::now()),
        ));

        let records = sink.with_msg(END_MSG);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("aborted"), Some(&json!(false)));
    }
}
