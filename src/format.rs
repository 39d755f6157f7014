use crate::event::JsonEventLayout;
use crate::record::LogRecord;
use std::sync::Arc;
use tracing::warn;

/// Externally supplied record formatter.
///
/// Implementations take full control of how a [`LogRecord`] becomes the
/// published payload.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

/// Externally supplied structured layout.
///
/// Same shape as [`RecordFormatter`], kept as a distinct seam because a
/// layout takes precedence over a formatter when both are supplied.
pub trait RecordLayout: Send + Sync {
    fn render(&self, record: &LogRecord) -> String;
}

impl RecordLayout for JsonEventLayout {
    fn render(&self, record: &LogRecord) -> String {
        self.format(record)
    }
}

/// Optional externally supplied rendering implementations handed to the
/// handler at construction time.
#[derive(Default)]
pub struct FormatOverrides {
    pub formatter: Option<Arc<dyn RecordFormatter>>,
    pub layout: Option<Arc<dyn RecordLayout>>,
}

/// The rendering strategy active for the lifetime of a handler.
/// Resolved exactly once at construction, never per record.
pub enum FormatStrategy {
    Formatter(Arc<dyn RecordFormatter>),
    Layout(Arc<dyn RecordLayout>),
    Default(JsonEventLayout),
}

impl FormatStrategy {
    /// Pick the active strategy. A supplied layout wins over a supplied
    /// formatter; with neither, warn once and fall back to the built-in
    /// [`JsonEventLayout`] configured with the given timestamp pattern.
    pub fn resolve(overrides: FormatOverrides, timestamp_pattern: Option<&str>) -> Self {
        match (overrides.formatter, overrides.layout) {
            (_, Some(layout)) => FormatStrategy::Layout(layout),
            (Some(formatter), None) => FormatStrategy::Formatter(formatter),
            (None, None) => {
                warn!("no formatter or layout supplied, using the built-in JSON event layout");
                FormatStrategy::Default(JsonEventLayout::new(timestamp_pattern))
            }
        }
    }

    pub fn render(&self, record: &LogRecord) -> String {
        match self {
            FormatStrategy::Formatter(formatter) => formatter.format(record),
            FormatStrategy::Layout(layout) => layout.render(record),
            FormatStrategy::Default(layout) => layout.format(record),
        }
    }
}
