use crate::config::OverflowAction;
use crate::handler::DirectHandler;
use crate::record::{Level, LogRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Queue capacity used when `async-queue-length` is not configured.
pub const DEFAULT_QUEUE_LENGTH: usize = 512;

/// Retry interval for `Block` producers on runtime worker threads,
/// where parking on the channel itself is not allowed.
const BLOCK_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Bounded-queue decorator around [`DirectHandler`].
///
/// Producers enqueue records without touching the broker; exactly one
/// background worker drains the queue in FIFO order, so records from a
/// single producer keep their relative order. When the queue is full
/// the configured [`OverflowAction`] applies: `Discard` drops the new
/// record (counted, otherwise silent), `Block` parks the producer until
/// a slot frees up.
pub struct AsyncHandler {
    inner: Arc<DirectHandler>,
    sender: mpsc::Sender<LogRecord>,
    worker: JoinHandle<()>,
    overflow: OverflowAction,
    threshold: Level,
    /// Records dropped because the queue was full under `Discard`.
    pub dropped_records: Arc<AtomicU64>,
}

impl AsyncHandler {
    /// Wrap a handler, spawning the drain worker. The threshold is
    /// taken from the inner handler so both layers filter consistently.
    pub fn new(
        inner: DirectHandler,
        queue_length: Option<usize>,
        overflow: OverflowAction,
    ) -> Self {
        let capacity = queue_length.unwrap_or(DEFAULT_QUEUE_LENGTH).max(1);
        let (sender, mut receiver) = mpsc::channel::<LogRecord>(capacity);

        let threshold = inner.threshold();
        let inner = Arc::new(inner);
        let drain = Arc::clone(&inner);
        let worker = inner.publisher().runtime().spawn(async move {
            while let Some(record) = receiver.recv().await {
                drain.handle_async(&record).await;
            }
        });

        AsyncHandler {
            inner,
            sender,
            worker,
            overflow,
            threshold,
            dropped_records: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue one record. Non-blocking under `Discard`; under `Block`
    /// this parks the calling thread while the queue is full. Safe to
    /// call from any thread, including runtime worker threads.
    pub fn handle(&self, record: &LogRecord) {
        if record.level < self.threshold {
            return;
        }
        match self.overflow {
            OverflowAction::Discard => {
                if self.sender.try_send(record.clone()).is_err() {
                    self.dropped_records.fetch_add(1, Ordering::Relaxed);
                }
            }
            OverflowAction::Block => self.enqueue_blocking(record.clone()),
        }
    }

    /// Park the producer until the queue accepts the record. Enqueueing
    /// fails outright only after shutdown closed the queue; at that
    /// point losing the record is the documented behavior.
    fn enqueue_blocking(&self, record: LogRecord) {
        if tokio::runtime::Handle::try_current().is_err() {
            let _ = self.sender.blocking_send(record);
            return;
        }

        // blocking_send panics on a runtime thread; apply the same
        // backpressure with a bounded retry sleep.
        let mut record = record;
        loop {
            match self.sender.try_send(record) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    record = returned;
                    std::thread::sleep(BLOCK_RETRY_INTERVAL);
                }
                Err(TrySendError::Closed(_)) => return,
            }
        }
    }

    /// Close the queue and wait up to `grace` for the worker to drain
    /// it. Records still queued after the grace period are abandoned.
    pub fn shutdown(self, grace: Duration) {
        let AsyncHandler {
            inner,
            sender,
            mut worker,
            ..
        } = self;

        drop(sender);
        let runtime = inner.publisher().runtime();
        let abort = worker.abort_handle();
        let drained = if tokio::runtime::Handle::try_current().is_err() {
            runtime
                .block_on(async { tokio::time::timeout(grace, &mut worker).await })
                .is_ok()
        } else {
            // Same constraint as enqueueing: no block_on on a runtime
            // thread. Await the worker on the delivery runtime and park
            // on a std channel.
            let (done_tx, done_rx) = std::sync::mpsc::sync_channel(1);
            runtime.spawn(async move {
                let _ = done_tx.send(tokio::time::timeout(grace, worker).await.is_ok());
            });
            done_rx.recv().unwrap_or(false)
        };
        if !drained {
            abort.abort();
        }
        inner.close(grace);
    }
}
