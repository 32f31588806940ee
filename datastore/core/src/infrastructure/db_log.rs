// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Database Logging Bridge
//!
//! Normalizes database log events into one four-level [`Severity`] model and
//! forwards them to a single [`LogSink`].
//!
//! Two source enumerations are understood:
//!
//! | Source | Codes | Used by |
//! |--------|-------|---------|
//! | [`StatementLevel`] | `0=Trace 1=Debug 2=Info 3=Error` | datastore statement logging |
//! | [`TraceLevel`] | `1=None 2=Error 3=Warn 4=Info 5=Debug 6=Trace` | driver connection tracing |
//!
//! Both mappings are total. Codes outside either table map to
//! [`Severity::Debug`] so an unrecognized level never drops a line.
//!
//! Events are emitted synchronously on the calling task, so a statement's log
//! line is never reordered relative to the statement itself. Lines from
//! concurrent statements may interleave.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Normalized severity of a database log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Error,
}

impl Severity {
    /// Map a raw statement-logger code; unknown codes are `Debug`
    pub fn from_statement_code(code: i64) -> Self {
        StatementLevel::from_code(code).map_or(Severity::Debug, Severity::from)
    }

    /// Map a raw driver trace code; unknown codes are `Debug`
    pub fn from_trace_code(code: i64) -> Self {
        TraceLevel::from_code(code).map_or(Severity::Debug, Severity::from)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Statement-logger levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementLevel {
    /// Full interaction flow: prepare, statement, execution, rows
    Trace = 0,
    /// Non-query calls such as ping and connect
    Debug = 1,
    /// Queries and executes
    Info = 2,
    /// Driver errors
    Error = 3,
}

impl StatementLevel {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(StatementLevel::Trace),
            1 => Some(StatementLevel::Debug),
            2 => Some(StatementLevel::Info),
            3 => Some(StatementLevel::Error),
            _ => None,
        }
    }
}

impl From<StatementLevel> for Severity {
    fn from(level: StatementLevel) -> Self {
        match level {
            StatementLevel::Trace => Severity::Trace,
            StatementLevel::Debug => Severity::Debug,
            StatementLevel::Info => Severity::Info,
            StatementLevel::Error => Severity::Error,
        }
    }
}

/// Driver trace levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    None = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
    Debug = 5,
    Trace = 6,
}

impl TraceLevel {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TraceLevel::None),
            2 => Some(TraceLevel::Error),
            3 => Some(TraceLevel::Warn),
            4 => Some(TraceLevel::Info),
            5 => Some(TraceLevel::Debug),
            6 => Some(TraceLevel::Trace),
            _ => None,
        }
    }
}

impl From<TraceLevel> for Severity {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Error => Severity::Error,
            TraceLevel::Info => Severity::Info,
            // Warn has no counterpart and takes the unmapped default
            TraceLevel::Warn | TraceLevel::Debug | TraceLevel::None => Severity::Debug,
            TraceLevel::Trace => Severity::Trace,
        }
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN | tracing::Level::INFO => Severity::Info,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::TRACE => Severity::Trace,
        }
    }
}

/// A normalized log event ready for a sink
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
    /// Structured fields in emission order; the last entry is always the
    /// `sql` field carrying `message`
    pub fields: Vec<(String, Value)>,
}

impl LogEvent {
    /// Normalize raw driver fields into an event.
    ///
    /// `time` is dropped (the sink stamps its own), `sql` values are
    /// flattened to one line and `message` is appended, also flattened, as a
    /// trailing `sql` field.
    pub fn new<I, K>(severity: Severity, message: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut normalized: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .filter(|(k, _)| k != "time")
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) if k == "sql" => Value::String(flatten_sql(&s)),
                    other => other,
                };
                (k, v)
            })
            .collect();
        normalized.push(("sql".to_string(), Value::String(flatten_sql(message))));

        Self {
            severity,
            message: message.to_string(),
            fields: normalized,
        }
    }

    /// Look up the first field named `key`
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Replace embedded newlines and tabs with spaces so a statement logs as one line
pub fn flatten_sql(sql: &str) -> String {
    sql.replace(['\n', '\r', '\t'], " ")
}

/// Destination for normalized events; must return promptly
pub trait LogSink: Send + Sync {
    fn emit(&self, event: &LogEvent);
}

/// Sink that forwards to the `tracing` subscriber under target `sitestore::db`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: &LogEvent) {
        // Trailing sql field goes out as its own tracing field
        let (head, sql) = match event.fields.split_last() {
            Some(((_, Value::String(sql)), head)) => (head, sql.as_str()),
            _ => (event.fields.as_slice(), event.message.as_str()),
        };
        let fields: Map<String, Value> = head.iter().cloned().collect();
        let fields = Value::Object(fields);

        match event.severity {
            Severity::Error => tracing::error!(target: "sitestore::db", fields = %fields, sql, "DB"),
            Severity::Info => tracing::info!(target: "sitestore::db", fields = %fields, sql, "DB"),
            Severity::Debug => tracing::debug!(target: "sitestore::db", fields = %fields, sql, "DB"),
            Severity::Trace => tracing::trace!(target: "sitestore::db", fields = %fields, sql, "DB"),
        }
    }
}

/// Normalizing front-end for a [`LogSink`]
///
/// With statement logging off only `Error` events reach the sink.
#[derive(Clone)]
pub struct DbLogger {
    sink: Arc<dyn LogSink>,
    statements: bool,
}

impl fmt::Debug for DbLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbLogger")
            .field("statements", &self.statements)
            .finish_non_exhaustive()
    }
}

impl Default for DbLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl DbLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            statements: true,
        }
    }

    pub fn with_statements(mut self, enabled: bool) -> Self {
        self.statements = enabled;
        self
    }

    pub fn statements_enabled(&self) -> bool {
        self.statements
    }

    /// Normalize and forward one event synchronously
    pub fn log<L, I, K>(&self, level: L, message: &str, fields: I)
    where
        L: Into<Severity>,
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let severity = level.into();
        if !self.statements && severity != Severity::Error {
            return;
        }
        self.sink.emit(&LogEvent::new(severity, message, fields));
    }
}
