//! Field serializers for request, response and error values.
//!
//! Serializers turn framework objects into compact JSON before they are
//! attached to a log record. `Serializers::std()` mirrors the classic
//! `req`/`res`/`err` shapes that log tooling already knows how to read.

use std::error::Error as StdError;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{request, response, HeaderMap};
use serde_json::{json, Map, Value};

/// Renders request head into a log field.
pub type RequestSerializer = fn(&request::Parts) -> Value;

/// Renders response head into a log field.
pub type ResponseSerializer = fn(&response::Parts) -> Value;

/// Renders an error (and its source chain) into a log field.
pub type ErrorSerializer = fn(&(dyn StdError + 'static)) -> Value;

/// The set of serializers a logger applies to `req`, `res` and `err` fields.
#[derive(Clone, Copy)]
pub struct Serializers {
    pub req: RequestSerializer,
    pub res: ResponseSerializer,
    pub err: ErrorSerializer,
}

impl Serializers {
    /// Standard serializers.
    pub fn std() -> Self {
        Self {
            req: std_request,
            res: std_response,
            err: std_error,
        }
    }

    /// Replace the request serializer.
    pub fn with_req(mut self, req: RequestSerializer) -> Self {
        self.req = req;
        self
    }

    /// Replace the response serializer.
    pub fn with_res(mut self, res: ResponseSerializer) -> Self {
        self.res = res;
        self
    }

    /// Replace the error serializer.
    pub fn with_err(mut self, err: ErrorSerializer) -> Self {
        self.err = err;
        self
    }
}

impl Default for Serializers {
    fn default() -> Self {
        Self::std()
    }
}

impl std::fmt::Debug for Serializers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializers").finish_non_exhaustive()
    }
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match map.get_mut(name.as_str()) {
            // Repeated headers are joined the way proxies fold them.
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            _ => {
                map.insert(name.as_str().to_string(), Value::String(value));
            }
        }
    }
    Value::Object(map)
}

/// `{ method, url, httpVersion, headers, remoteAddress, remotePort }`.
pub fn std_request(parts: &request::Parts) -> Value {
    let mut value = json!({
        "method": parts.method.as_str(),
        "url": parts.uri.to_string(),
        "httpVersion": format!("{:?}", parts.version),
        "headers": headers_to_json(&parts.headers),
    });

    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        value["remoteAddress"] = json!(addr.ip().to_string());
        value["remotePort"] = json!(addr.port());
    }

    value
}

/// `{ statusCode, header }`.
pub fn std_response(parts: &response::Parts) -> Value {
    json!({
        "statusCode": parts.status.as_u16(),
        "header": headers_to_json(&parts.headers),
    })
}

/// `{ message, sources }` where `sources` walks the `source()` chain.
pub fn std_error(err: &(dyn StdError + 'static)) -> Value {
    let mut sources = Vec::new();
    let mut next = err.source();
    while let Some(source) = next {
        sources.push(Value::String(source.to_string()));
        next = source.source();
    }

    json!({
        "message": err.to_string(),
        "sources": sources,
    })
}
