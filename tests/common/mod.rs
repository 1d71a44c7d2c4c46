//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use request_correlator::config::AppConfig;
use request_correlator::observability::{LogRecord, Logger, MemorySink};
use request_correlator::HttpServer;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

/// Process logger that captures into memory.
pub fn memory_logger(name: &str) -> (Logger, MemorySink) {
    let sink = MemorySink::new();
    (Logger::builder(name).sink(sink.clone()).build(), sink)
}

/// Send one request through `router` and read the whole body.
pub async fn send(router: Router, req: Request<Body>) -> (Response<()>, String) {
    let response = router.oneshot(req).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (
        Response::from_parts(parts, ()),
        String::from_utf8(bytes.to_vec()).unwrap(),
    )
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Records whose `req_id` equals `id`.
pub fn records_for(sink: &MemorySink, id: &str) -> Vec<LogRecord> {
    sink.records()
        .into_iter()
        .filter(|r| r.field("req_id").and_then(|v| v.as_str()) == Some(id))
        .collect()
}

/// Poll `sink` until it holds at least `count` records.
pub async fn wait_for_records(sink: &MemorySink, count: usize) {
    for _ in 0..200 {
        if sink.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} records, got {}", count, sink.len());
}

/// Start the demo server on an ephemeral port.
pub async fn start_server(config: AppConfig, logger: Logger) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(&config, logger).unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = server
            .run_until(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    (addr, tx)
}
