use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of a [`LogRecord`], ordered from least to most severe.
///
/// The ordering is used for threshold filtering: a record passes a
/// threshold when `record.level >= threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing a [`Level`] from a string fails.
#[derive(Debug, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// Error details attached to a [`LogRecord`].
///
/// Every field is optional; only the present ones appear in the
/// serialized event document.
#[derive(Debug, Clone, Default)]
pub struct ErrorInfo {
    pub exception_class: Option<String>,
    pub exception_message: Option<String>,
    pub stacktrace: Option<String>,
}

/// One emitted application log line plus its structured metadata,
/// before serialization. Immutable once handed to a handler.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger_name: String,
    pub message: String,
    pub thread_name: String,
    /// Structured context map attached to the record (string-valued).
    pub mdc: Option<BTreeMap<String, String>>,
    /// Free-form diagnostic context string for the current unit of work.
    pub ndc: Option<String>,
    pub error: Option<ErrorInfo>,
}

impl LogRecord {
    /// Build a record stamped with the current time and the name of the
    /// calling thread. The optional fields start out absent.
    pub fn new(level: Level, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            message: message.into(),
            thread_name: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
            mdc: None,
            ndc: None,
            error: None,
        }
    }
}

/// Convert a unix-epoch-milliseconds timestamp into the record's time
/// type. Out-of-range inputs clamp to the epoch.
pub fn timestamp_from_epoch_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}
