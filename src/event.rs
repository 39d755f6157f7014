use crate::record::LogRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::warn;

/// Default timestamp pattern, the chrono rendering of
/// `yyyy-MM-dd'T'HH:mm:ss.SSS'Z'`.
pub const DEFAULT_TIMESTAMP_PATTERN: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Literal emitted as `hostName` when the local hostname cannot be
/// resolved at startup.
pub const UNKNOWN_HOST: &str = "unknown-host";

/// Built-in event layout producing one newline-terminated JSON document
/// per record.
///
/// The conversion is pure and total: it performs no I/O, never fails,
/// and omits absent optional fields instead of emitting nulls. The
/// hostname is resolved once at construction; timestamps are always
/// rendered in UTC regardless of the host time zone.
#[derive(Debug, Clone)]
pub struct JsonEventLayout {
    hostname: String,
    timestamp_pattern: String,
}

/// Serialized shape of the event document. Field names are part of the
/// wire contract; key order is not.
#[derive(Serialize)]
struct LogEvent<'a> {
    #[serde(rename = "@version")]
    version: u32,
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(rename = "hostName")]
    host_name: &'a str,
    message: &'a str,
    #[serde(rename = "loggerName")]
    logger_name: &'a str,
    level: String,
    #[serde(rename = "threadName")]
    thread_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mdc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ndc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<ExceptionInfo<'a>>,
}

#[derive(Serialize)]
struct ExceptionInfo<'a> {
    #[serde(rename = "exceptionClass", skip_serializing_if = "Option::is_none")]
    exception_class: Option<&'a str>,
    #[serde(rename = "exceptionMessage", skip_serializing_if = "Option::is_none")]
    exception_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stacktrace: Option<&'a str>,
}

impl JsonEventLayout {
    /// Create a layout with the given timestamp pattern, or
    /// [`DEFAULT_TIMESTAMP_PATTERN`] when none is configured. Resolves
    /// and caches the local hostname.
    pub fn new(timestamp_pattern: Option<&str>) -> Self {
        Self::with_hostname(resolve_hostname(), timestamp_pattern)
    }

    /// Create a layout with an explicit hostname value instead of
    /// resolving one. Mainly useful in tests.
    pub fn with_hostname(hostname: String, timestamp_pattern: Option<&str>) -> Self {
        let pattern = timestamp_pattern.unwrap_or(DEFAULT_TIMESTAMP_PATTERN);
        JsonEventLayout {
            hostname,
            timestamp_pattern: validate_pattern(pattern),
        }
    }

    /// Convert one record into its newline-terminated JSON document.
    pub fn format(&self, record: &LogRecord) -> String {
        let event = LogEvent {
            version: 1,
            timestamp: record
                .timestamp
                .format(&self.timestamp_pattern)
                .to_string(),
            host_name: &self.hostname,
            message: &record.message,
            logger_name: &record.logger_name,
            level: record.level.to_string(),
            thread_name: &record.thread_name,
            mdc: record
                .mdc
                .as_ref()
                .map(|map| serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())),
            ndc: record.ndc.as_deref(),
            exception: record.error.as_ref().map(|err| ExceptionInfo {
                exception_class: err.exception_class.as_deref(),
                exception_message: err.exception_message.as_deref(),
                stacktrace: err.stacktrace.as_deref(),
            }),
        };

        // String-only payload, so serialization is infallible in
        // practice; degrade to a placeholder document rather than fail.
        let mut line = serde_json::to_string(&event)
            .unwrap_or_else(|_| r#"{"@version":1,"message":"unserializable log event"}"#.to_string());
        line.push('\n');
        line
    }
}

/// Check that a chrono pattern can actually render, falling back to the
/// default pattern when it cannot. Keeps `format` total for arbitrary
/// configured patterns.
fn validate_pattern(pattern: &str) -> String {
    let probe: DateTime<Utc> = DateTime::UNIX_EPOCH;
    let mut rendered = String::new();
    if write!(rendered, "{}", probe.format(pattern)).is_ok() {
        pattern.to_string()
    } else {
        warn!(pattern, "invalid timestamp pattern, using the default");
        DEFAULT_TIMESTAMP_PATTERN.to_string()
    }
}

/// Resolve the local hostname once. Prefers the `HOSTNAME` environment
/// variable (commonly set in containers), then the system hostname, and
/// finally falls back to [`UNKNOWN_HOST`].
pub fn resolve_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.is_empty() {
            return name;
        }
    }

    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy().into_owned();
            if name.is_empty() {
                UNKNOWN_HOST.to_string()
            } else {
                name
            }
        }
        Err(_) => UNKNOWN_HOST.to_string(),
    }
}
