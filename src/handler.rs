use crate::format::FormatStrategy;
use crate::overflow::AsyncHandler;
use crate::publisher::{report_delivery_failure, BrokerPublisher, DeliveryError};
use crate::record::{Level, LogRecord};
use std::time::Duration;

/// The log-handling entry point: filters by level, renders the record
/// through the resolved format strategy and forwards the bytes to the
/// publisher.
///
/// A failed delivery reaches the caller only when both `sync_send` is
/// on and `ignore_exceptions` is off; every other failure is contained
/// inside the pipeline.
pub struct DirectHandler {
    strategy: FormatStrategy,
    publisher: BrokerPublisher,
    threshold: Level,
    sync_send: bool,
    ignore_exceptions: bool,
}

impl DirectHandler {
    pub fn new(
        strategy: FormatStrategy,
        publisher: BrokerPublisher,
        threshold: Level,
        sync_send: bool,
        ignore_exceptions: bool,
    ) -> Self {
        DirectHandler {
            strategy,
            publisher,
            threshold,
            sync_send,
            ignore_exceptions,
        }
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }

    pub(crate) fn publisher(&self) -> &BrokerPublisher {
        &self.publisher
    }

    /// Handle one record on the calling thread. Records below the
    /// threshold return immediately without being formatted.
    pub fn handle(&self, record: &LogRecord) -> Result<(), DeliveryError> {
        if record.level < self.threshold {
            return Ok(());
        }
        let line = self.strategy.render(record);
        if self.sync_send {
            match self.publisher.publish_blocking(line.as_bytes()) {
                Ok(()) => Ok(()),
                Err(err) if self.ignore_exceptions => {
                    report_delivery_failure(true, &err);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        } else {
            self.publisher.publish_detached(line.into_bytes());
            Ok(())
        }
    }

    /// Drain-worker variant of [`handle`](Self::handle). Awaits the
    /// acknowledgment before the worker picks the next record, which
    /// keeps queued records in submission order, and never propagates
    /// the failure; the producer detached from it when it enqueued.
    pub(crate) async fn handle_async(&self, record: &LogRecord) {
        if record.level < self.threshold {
            return;
        }
        let line = self.strategy.render(record);
        if let Err(err) = self.publisher.publish(line.as_bytes()).await {
            report_delivery_failure(self.ignore_exceptions, &err);
        }
    }

    pub fn close(&self, grace: Duration) {
        self.publisher.close(grace);
    }
}

/// A constructed pipeline handler: either the direct handler or the
/// bounded-queue async wrapper around it. Construction in
/// [`crate::init::build_handler`] picks one; there is no runtime
/// re-wrapping.
pub enum LogHandler {
    Direct(DirectHandler),
    Async(AsyncHandler),
}

impl LogHandler {
    /// Handle one record. Only the direct, sync-send,
    /// exceptions-not-ignored combination can return an error.
    pub fn handle(&self, record: &LogRecord) -> Result<(), DeliveryError> {
        match self {
            LogHandler::Direct(handler) => handler.handle(record),
            LogHandler::Async(handler) => {
                handler.handle(record);
                Ok(())
            }
        }
    }

    /// Tear the handler down, draining queued records best-effort
    /// within the grace period. Anything still queued afterwards is
    /// lost; shipping is not durable across shutdown.
    pub fn shutdown(self, grace: Duration) {
        match self {
            LogHandler::Direct(handler) => handler.close(grace),
            LogHandler::Async(handler) => handler.shutdown(grace),
        }
    }
}
