//! Process-wide structured logger and its child loggers.
//!
//! # Responsibilities
//! - Hold the fixed fields every record carries (`name`, `hostname`, `pid`)
//! - Derive child loggers with extra fixed fields (`child`)
//! - Build `LogRecord`s and hand them to a `LogSink`
//!
//! # Design Decisions
//! - `Logger` is an `Arc` handle: cloning is cheap, state is immutable
//! - A child never mutates its parent; it owns a merged copy of the fields
//! - Level filtering happens before a record is built

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::observability::serializers::Serializers;
use crate::observability::sink::{LogSink, TracingSink};

/// Structured fields attached to a logger or a single record.
pub type Fields = Map<String, Value>;

/// Record severity. Numeric values follow the common JSON log convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Numeric level (10 = trace ... 50 = error).
    pub fn as_u8(self) -> u8 {
        match self {
            Level::Trace => 10,
            Level::Debug => 20,
            Level::Info => 30,
            Level::Warn => 40,
            Level::Error => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// A single emitted log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub msg: String,
    pub time: DateTime<Utc>,
    /// Logger fixed fields merged with per-call fields.
    pub fields: Fields,
}

impl LogRecord {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Render the record as one flat JSON object.
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("level".into(), Value::from(self.level.as_u8()));
        object.insert("msg".into(), Value::from(self.msg.clone()));
        object.insert("time".into(), Value::from(self.time.to_rfc3339()));
        object.insert("v".into(), Value::from(0));
        Value::Object(object)
    }
}

struct LoggerInner {
    fields: Fields,
    level: Level,
    serializers: Serializers,
    sink: Arc<dyn LogSink>,
}

/// Structured logger handle.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Start building a process-wide logger named `name`.
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(name)
    }

    /// Derive a logger with `fields` merged over this logger's fixed fields.
    pub fn child(&self, fields: Fields) -> Logger {
        self.child_with_serializers(fields, self.inner.serializers)
    }

    /// Like `child`, with a different serializer set.
    pub fn child_with_serializers(&self, fields: Fields, serializers: Serializers) -> Logger {
        let mut merged = self.inner.fields.clone();
        merged.extend(fields);
        Logger {
            inner: Arc::new(LoggerInner {
                fields: merged,
                level: self.inner.level,
                serializers,
                sink: Arc::clone(&self.inner.sink),
            }),
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.inner.fields
    }

    pub fn level(&self) -> Level {
        self.inner.level
    }

    pub fn serializers(&self) -> &Serializers {
        &self.inner.serializers
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.inner.level
    }

    /// Emit a record at `level` carrying `fields` in addition to the fixed ones.
    pub fn log(&self, level: Level, fields: Fields, msg: &str) {
        if !self.enabled(level) {
            return;
        }

        let mut merged = self.inner.fields.clone();
        merged.extend(fields);
        self.inner.sink.emit(LogRecord {
            level,
            msg: msg.to_string(),
            time: Utc::now(),
            fields: merged,
        });
    }

    pub fn trace(&self, fields: Fields, msg: &str) {
        self.log(Level::Trace, fields, msg);
    }

    pub fn debug(&self, fields: Fields, msg: &str) {
        self.log(Level::Debug, fields, msg);
    }

    pub fn info(&self, fields: Fields, msg: &str) {
        self.log(Level::Info, fields, msg);
    }

    pub fn warn(&self, fields: Fields, msg: &str) {
        self.log(Level::Warn, fields, msg);
    }

    pub fn error(&self, fields: Fields, msg: &str) {
        self.log(Level::Error, fields, msg);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("fields", &self.inner.fields)
            .field("level", &self.inner.level)
            .finish_non_exhaustive()
    }
}

/// Builder for the process-wide `Logger`.
pub struct LoggerBuilder {
    name: String,
    level: Level,
    serializers: Serializers,
    sink: Option<Arc<dyn LogSink>>,
    fields: Fields,
}

impl LoggerBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: Level::Info,
            serializers: Serializers::std(),
            sink: None,
            fields: Fields::new(),
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn serializers(mut self, serializers: Serializers) -> Self {
        self.serializers = serializers;
        self
    }

    /// Where records go. Defaults to `TracingSink`.
    pub fn sink<S: LogSink>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Logger {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from(self.name));
        fields.insert("hostname".into(), Value::from(hostname()));
        fields.insert("pid".into(), Value::from(std::process::id()));
        fields.extend(self.fields);

        Logger {
            inner: Arc::new(LoggerInner {
                fields,
                level: self.level,
                serializers: self.serializers,
                sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn LogSink>),
            }),
        }
    }
}

fn hostname() -> String {
    let name = gethostname::gethostname().to_string_lossy().into_owned();
    if name.is_empty() {
        "localhost".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::sink::MemorySink;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn root_has_process_fields() {
        let log = Logger::builder("test123")
            .field("service", "api")
            .sink(MemorySink::new())
            .build();
        assert_eq!(log.fields()["name"], "test123");
        assert_eq!(log.fields()["service"], "api");
        assert!(!log.fields()["hostname"].as_str().unwrap().is_empty());
        assert_eq!(log.fields()["pid"], std::process::id());
        assert_eq!(log.level(), Level::Info);
    }

    #[test]
    fn child_merges_without_touching_parent() {
        let sink = MemorySink::new();
        let parent = Logger::builder("svc").sink(sink.clone()).build();
        let child = parent.child(fields(json!({ "origin": "request", "name": "override" })));

        assert_eq!(child.fields()["origin"], "request");
        assert_eq!(child.fields()["name"], "override");
        assert!(parent.fields().get("origin").is_none());
        assert_eq!(parent.fields()["name"], "svc");

        child.info(fields(json!({ "k": 1 })), "hello");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].msg, "hello");
        assert_eq!(records[0].field("origin"), Some(&json!("request")));
        assert_eq!(records[0].field("k"), Some(&json!(1)));
    }

    #[test]
    fn below_threshold_is_dropped() {
        let sink = MemorySink::new();
        let log = Logger::builder("svc").level(Level::Warn).sink(sink.clone()).build();

        log.info(Fields::new(), "quiet");
        log.debug(Fields::new(), "quieter");
        log.error(Fields::new(), "loud");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Error);
    }

    #[test]
    fn record_json_is_flat() {
        let sink = MemorySink::new();
        let log = Logger::builder("svc").sink(sink.clone()).build();
        log.warn(fields(json!({ "req_id": "abc" })), "careful");

        let json = sink.records()[0].to_json();
        assert_eq!(json["level"], 40);
        assert_eq!(json["msg"], "careful");
        assert_eq!(json["req_id"], "abc");
        assert_eq!(json["name"], "svc");
        assert!(json["time"].is_string());
    }

    #[test]
    fn level_parsing() {
        assert_eq!("INFO".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
        assert!("loud".parse::<Level>().is_err());
    }
}
