use crate::handler::LogHandler;
use crate::record::{Level, LogRecord};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns observed events into
/// [`LogRecord`]s and feeds them to a [`LogHandler`].
///
/// The event message becomes the record message, the remaining fields
/// land in the mdc map, and a field literally named `ndc` is lifted
/// into the record's diagnostic-context slot. The handler applies its
/// own level threshold; the layer forwards everything it sees.
pub struct KafkaLogLayer {
    handler: Arc<LogHandler>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Events accepted by the handler without a surfaced error.
    pub shipped_events: Arc<AtomicU64>,
}

impl KafkaLogLayer {
    pub fn new(handler: LogHandler) -> Self {
        KafkaLogLayer {
            handler: Arc::new(handler),
            total_events: Arc::new(AtomicU64::new(0)),
            shipped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn handler(&self) -> Arc<LogHandler> {
        Arc::clone(&self.handler)
    }
}

impl<S> Layer<S> for KafkaLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let ndc = fields.remove("ndc");
        let meta = event.metadata();
        let record = LogRecord {
            timestamp: Utc::now(),
            level: map_level(meta.level()),
            logger_name: meta.target().to_string(),
            message: message.unwrap_or_default(),
            thread_name: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
            mdc: if fields.is_empty() { None } else { Some(fields) },
            ndc,
            error: None,
        };

        // Delivery failures are contained by the handler; they must
        // never propagate back into the tracing pipeline.
        if self.handler.handle(&record).is_ok() {
            self.shipped_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn map_level(level: &tracing::Level) -> Level {
    if *level == tracing::Level::ERROR {
        Level::Error
    } else if *level == tracing::Level::WARN {
        Level::Warn
    } else if *level == tracing::Level::INFO {
        Level::Info
    } else if *level == tracing::Level::DEBUG {
        Level::Debug
    } else {
        Level::Trace
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut BTreeMap<String, String>,
    message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // The formatted event message arrives through this path.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}
