//! Structured JSON logger used by the middleware pipeline.
//!
//! Every call to [`Logger::log`] produces exactly one self-contained record.
//! [`JsonLogger`] writes it as a single JSON line:
//!
//! ```text
//! {"msg":"HTTP request","timestamp":"2024-01-15T10:30:00Z","method":"GET","uri":"/health"}
//! ```
//!
//! # Field Lists
//!
//! Fields are passed as an alternating key/value slice. A trailing key without
//! a value is dropped silently: logging must never fail a request because a
//! caller miscounted its arguments.
//!
//! # Concurrency
//!
//! The record is serialized before the sink lock is taken, and the complete
//! line (newline included) is written while holding it, so concurrent callers
//! never interleave partial lines.
//!
//! [`JsonLogger`] is separate from the `tracing` diagnostics emitted elsewhere
//! in the crate, which the binary routes to stderr. Applications that already
//! run a subscriber can use [`TracingLogger`] to send pipeline records there
//! instead.

use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// Key holding the record message.
pub const MESSAGE_KEY: &str = "msg";

/// Key holding the record timestamp.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Errors returned by a [`Logger`].
#[derive(Error, Debug)]
pub enum LogError {
    #[error("log: marshalling json: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("log: writing record: {0}")]
    Io(#[from] io::Error),
}

/// Minimal structured logging capability required by the middleware.
///
/// `fields` alternates keys and values: `&["method", "GET", "uri", "/"]`.
pub trait Logger: Send + Sync {
    fn log(&self, msg: &str, fields: &[&str]) -> Result<(), LogError>;
}

/// A single log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<(String, String)>,
}

impl LogRecord {
    /// Build a record stamped with the current UTC time.
    ///
    /// Pairs up `fields`; an odd trailing entry is discarded.
    pub fn new(msg: &str, fields: &[&str]) -> Self {
        Self {
            message: msg.to_string(),
            timestamp: Utc::now(),
            fields: fields
                .chunks_exact(2)
                .filter_map(|pair| match pair {
                    [key, value] => Some((key.to_string(), value.to_string())),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Look up the first field with the given key.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(MESSAGE_KEY, &self.message)?;
        map.serialize_entry(
            TIMESTAMP_KEY,
            &self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        for (key, value) in &self.fields {
            // The envelope keys are not overridable
            if key == MESSAGE_KEY || key == TIMESTAMP_KEY {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Logger writing one JSON object per line to any `Write` sink.
pub struct JsonLogger<W> {
    writer: Mutex<W>,
}

impl JsonLogger<io::Stdout> {
    /// Logger writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the logger and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Logger for JsonLogger<W> {
    fn log(&self, msg: &str, fields: &[&str]) -> Result<(), LogError> {
        let record = LogRecord::new(msg, fields);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Logger that keeps records in memory.
///
/// Handy for embedding the pipeline in tests or tools that inspect what was
/// logged instead of parsing output.
#[derive(Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records logged so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records carrying the given field key.
    pub fn records_with_field(&self, key: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.field(key).is_some())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, msg: &str, fields: &[&str]) -> Result<(), LogError> {
        self.records.lock().push(LogRecord::new(msg, fields));
        Ok(())
    }
}

/// Logger that forwards records to the active `tracing` subscriber.
///
/// Each record becomes one `INFO` event under the `admission_pipeline::log`
/// target. The record message is the event message and the paired fields are
/// rendered as `key="value"` pairs in a single `fields` value, since tracing
/// field names must be known at compile time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, msg: &str, fields: &[&str]) -> Result<(), LogError> {
        let record = LogRecord::new(msg, fields);
        tracing::info!(
            target: "admission_pipeline::log",
            fields = %FieldList(&record.fields),
            "{}",
            record.message
        );
        Ok(())
    }
}

struct FieldList<'a>(&'a [(String, String)]);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value:?}")?;
        }
        Ok(())
    }
}
