//! Log record destinations.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::observability::logger::{Level, LogRecord};

/// Destination for emitted records.
///
/// Sinks own transport. Write failures are the sink's business; the
/// logger never retries or buffers.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, record: LogRecord);
}

/// Forwards records to the `tracing` subscriber as events.
///
/// Schema fields become typed event fields: `duration` is an `f64`,
/// `aborted` a `bool`, `req_id`/`origin`/`name`/`hostname` strings and `pid`
/// an integer. `req`, `res` and `err` are rendered as JSON text. Anything
/// else a caller attached is collected into a JSON object under `extra`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

/// Fields lifted out of the record into their own tracing fields.
const LIFTED: [&str; 10] = [
    "req_id", "origin", "name", "hostname", "pid", "duration", "aborted", "req", "res", "err",
];

fn text<'a>(record: &'a LogRecord, key: &str) -> Option<&'a str> {
    record.field(key).and_then(Value::as_str)
}

fn json_text(record: &LogRecord, key: &str) -> Option<String> {
    record.field(key).map(Value::to_string)
}

macro_rules! forward {
    ($level:ident, $record:expr, $extra:expr) => {{
        let record = $record;
        let req = json_text(record, "req");
        let res = json_text(record, "res");
        let err = json_text(record, "err");
        tracing::$level!(
            target: "request_correlator",
            req_id = text(record, "req_id"),
            origin = text(record, "origin"),
            name = text(record, "name"),
            hostname = text(record, "hostname"),
            pid = record.field("pid").and_then(serde_json::Value::as_u64),
            duration = record.field("duration").and_then(serde_json::Value::as_f64),
            aborted = record.field("aborted").and_then(serde_json::Value::as_bool),
            req = req.as_deref(),
            res = res.as_deref(),
            err = err.as_deref(),
            extra = $extra,
            "{}",
            record.msg
        )
    }};
}

impl LogSink for TracingSink {
    fn emit(&self, record: LogRecord) {
        let rest: Map<String, Value> = record
            .fields
            .iter()
            .filter(|(key, _)| !LIFTED.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let extra = (!rest.is_empty()).then(|| Value::Object(rest).to_string());
        let extra = extra.as_deref();

        match record.level {
            Level::Trace => forward!(trace, &record, extra),
            Level::Debug => forward!(debug, &record, extra),
            Level::Info => forward!(info, &record, extra),
            Level::Warn => forward!(warn, &record, extra),
            Level::Error => forward!(error, &record, extra),
        }
    }
}

/// Writes one JSON object per line.
pub struct JsonSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> LogSink for JsonSink<W> {
    fn emit(&self, record: LogRecord) {
        let line = record.to_json().to_string();
        let mut writer = self.writer.lock().expect("json sink mutex poisoned");
        let _ = writeln!(writer, "{}", line);
        let _ = writer.flush();
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records captured so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().expect("memory sink mutex poisoned").clone()
    }

    /// Records whose message equals `msg`.
    pub fn with_msg(&self, msg: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.msg == msg)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("memory sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().expect("memory sink mutex poisoned").clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: LogRecord) {
        self.records
            .lock()
            .expect("memory sink mutex poisoned")
            .push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::completion::{CompletionGuard, Outcome, END_MSG};
    use crate::observability::logger::{Fields, Logger};
    use serde_json::json;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_sink_writes_lines() {
        let buf = SharedBuf::default();
        let log = Logger::builder("svc").sink(JsonSink::new(buf.clone())).build();

        log.info(Fields::new(), "one");
        log.info(Fields::new(), "two");

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["msg"], "one");
        assert_eq!(lines[1]["level"], 30);
        assert_eq!(lines[1]["name"], "svc");
    }

    #[test]
    fn memory_sink_filters_and_clears() {
        let sink = MemorySink::new();
        let log = Logger::builder("svc").sink(sink.clone()).build();

        log.info(Fields::new(), "a");
        log.info(Fields::new(), "b");
        log.info(Fields::new(), "a");

        assert_eq!(sink.with_msg("a").len(), 2);
        assert_eq!(sink.len(), 3);
        sink.clear();
        assert!(sink.is_empty());
    }

    fn capture_tracing(emit: impl FnOnce()) -> Vec<Value> {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        out.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn tracing_sink_emits_typed_schema_fields() {
        let log = Logger::builder("svc").build();
        let lines = capture_tracing(|| {
            let mut scoped = Fields::new();
            scoped.insert("req_id".into(), Value::from("abc-123"));
            scoped.insert("origin".into(), Value::from("request"));
            let request_log = log.child(scoped);

            let mut guard = CompletionGuard::new(request_log, Instant::now());
            guard.set_response(json!({ "statusCode": 200, "header": "HTTP/1.1 200 OK" }));
            guard.fire(Outcome::Completed);
        });

        assert_eq!(lines.len(), 1);
        let event = &lines[0];
        assert_eq!(event["level"], "INFO");
        assert_eq!(event["target"], "request_correlator");

        let fields = &event["fields"];
        assert_eq!(fields["message"], END_MSG);
        assert_eq!(fields["req_id"], "abc-123");
        assert_eq!(fields["origin"], "request");
        assert_eq!(fields["name"], "svc");
        assert!(fields["duration"].is_f64(), "duration: {}", fields["duration"]);
        assert_eq!(fields["aborted"], json!(false));
        assert!(fields["pid"].is_u64());
        assert!(fields.get("record").is_none());
        assert!(fields.get("extra").is_none());
        assert!(fields.get("req").is_none());

        let res: Value = serde_json::from_str(fields["res"].as_str().unwrap()).unwrap();
        assert_eq!(res["statusCode"], 200);
    }

    #[test]
    fn tracing_sink_keeps_unknown_fields_and_level() {
        let log = Logger::builder("svc").level(Level::Debug).build();
        let lines = capture_tracing(|| {
            let mut fields = Fields::new();
            fields.insert("attempt".into(), Value::from(3));
            log.warn(fields, "retrying");
            log.debug(Fields::new(), "detail");
        });

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "WARN");
        assert_eq!(lines[0]["fields"]["message"], "retrying");
        let extra: Value =
            serde_json::from_str(lines[0]["fields"]["extra"].as_str().unwrap()).unwrap();
        assert_eq!(extra, json!({ "attempt": 3 }));
        assert!(lines[0]["fields"].get("duration").is_none());
        assert!(lines[0]["fields"].get("aborted").is_none());
        assert_eq!(lines[1]["level"], "DEBUG");
    }
}
