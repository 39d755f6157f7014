use crate::config::DeliveryConfig;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// A delivery attempt that the broker rejected, timed out or could not
/// be transported.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("broker rejected the event: {0}")]
    Rejected(String),
    #[error("broker transport failure: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),
}

/// Opaque broker capability.
///
/// `publish` resolves once the broker has acknowledged the event per
/// the client's configured delivery guarantees, or with the failure.
/// Concrete wiring (endpoints, acks, retries, timeouts, compression,
/// credentials) lives behind the implementation.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), DeliveryError>;

    /// Flush in-flight events best-effort within the grace period.
    fn close(&self, grace: Duration) {
        let _ = grace;
    }
}

/// The runtime that carries all broker I/O for the process. Never torn
/// down, so detached delivery tasks cannot outlive their executor.
fn delivery_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("kafka-log-delivery")
            .enable_all()
            .build()
            .expect("create delivery runtime")
    })
}

/// Write a contained delivery failure to the process fault channel.
/// Stderr, never the tracing pipeline, which must not be re-entered.
pub(crate) fn report_delivery_failure(ignored: bool, err: &DeliveryError) {
    if ignored {
        eprintln!("kafka log delivery failed (ignored): {err}");
    } else {
        eprintln!("kafka log delivery failed: {err}");
    }
}

/// Wraps a [`BrokerClient`] with the crate's two send modes: a blocking
/// send for `sync_send` callers and a detached fire-and-forget send.
///
/// Detached sends are funneled through one dispatch task per publisher,
/// so they reach the broker client in submission order. Failures on
/// that path never reach the producer; they are counted and reported
/// through [`report_delivery_failure`].
pub struct BrokerPublisher {
    client: Arc<dyn BrokerClient>,
    topic: String,
    detached: mpsc::UnboundedSender<Vec<u8>>,
    /// Total failed delivery attempts observed by this publisher.
    pub delivery_failures: Arc<AtomicU64>,
}

impl BrokerPublisher {
    pub fn new(client: Arc<dyn BrokerClient>, config: &DeliveryConfig) -> Self {
        let delivery_failures = Arc::new(AtomicU64::new(0));
        let (detached, mut queue) = mpsc::unbounded_channel::<Vec<u8>>();

        let dispatch_client = Arc::clone(&client);
        let dispatch_topic = config.topic.clone();
        let failures = Arc::clone(&delivery_failures);
        let ignore = config.ignore_exceptions;
        delivery_runtime().spawn(async move {
            while let Some(payload) = queue.recv().await {
                if let Err(err) = dispatch_client.publish(&dispatch_topic, &payload).await {
                    failures.fetch_add(1, Ordering::Relaxed);
                    report_delivery_failure(ignore, &err);
                }
            }
        });

        BrokerPublisher {
            client,
            topic: config.topic.clone(),
            detached,
            delivery_failures,
        }
    }

    pub(crate) fn runtime(&self) -> &'static Runtime {
        delivery_runtime()
    }

    /// Publish one event and wait for the broker's acknowledgment.
    pub async fn publish(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        let result = self.client.publish(&self.topic, payload).await;
        if result.is_err() {
            self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Blocking variant of [`publish`](Self::publish) for the sync-send
    /// path. Parks the calling thread until the broker acknowledges or
    /// the client's delivery timeout fires. Safe to call from any
    /// thread, including runtime worker threads.
    pub fn publish_blocking(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return self.runtime().block_on(self.publish(payload));
        }

        // block_on panics on a runtime thread; run the publish on the
        // delivery runtime and park on a std channel instead.
        let (done_tx, done_rx) = std::sync::mpsc::sync_channel(1);
        let client = Arc::clone(&self.client);
        let topic = self.topic.clone();
        let failures = Arc::clone(&self.delivery_failures);
        let payload = payload.to_vec();
        self.runtime().spawn(async move {
            let result = client.publish(&topic, &payload).await;
            if result.is_err() {
                failures.fetch_add(1, Ordering::Relaxed);
            }
            let _ = done_tx.send(result);
        });

        match done_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Rejected(
                "delivery task stopped before acknowledging".to_string(),
            )),
        }
    }

    /// Fire-and-forget send. Returns immediately; the dispatch task
    /// delivers queued payloads in order, and the outcome is only
    /// observable through the failure counter and the fault channel.
    pub fn publish_detached(&self, payload: Vec<u8>) {
        // Fails only when the dispatch task is gone, at process end.
        let _ = self.detached.send(payload);
    }

    pub fn close(&self, grace: Duration) {
        self.client.close(grace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingClient {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    impl RecordingClient {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(RecordingClient {
                published: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl BrokerClient for RecordingClient {
        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Rejected("stub failure".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            enabled: true,
            broker_list: vec!["localhost:9092".to_string()],
            topic: "mylog".to_string(),
            ..DeliveryConfig::default()
        }
    }

    #[test]
    fn blocking_publish_reaches_the_client() {
        let client = RecordingClient::new(false);
        let publisher = BrokerPublisher::new(client.clone(), &config());

        publisher.publish_blocking(b"event\n").unwrap();

        let published = client.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "mylog");
        assert_eq!(published[0].1, b"event\n");
    }

    #[tokio::test]
    async fn blocking_publish_survives_an_async_context() {
        let client = RecordingClient::new(false);
        let publisher = BrokerPublisher::new(client.clone(), &config());

        publisher.publish_blocking(b"event\n").unwrap();

        assert_eq!(client.published.lock().unwrap().len(), 1);
    }

    #[test]
    fn failures_bump_the_counter() {
        let client = RecordingClient::new(true);
        let publisher = BrokerPublisher::new(client, &config());

        assert!(publisher.publish_blocking(b"event\n").is_err());
        assert!(publisher.publish_blocking(b"event\n").is_err());
        assert_eq!(publisher.delivery_failures.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn detached_publish_returns_immediately_and_delivers() {
        let client = RecordingClient::new(false);
        let publisher = BrokerPublisher::new(client.clone(), &config());

        publisher.publish_detached(b"event\n".to_vec());

        for _ in 0..100 {
            if !client.published.lock().unwrap().is_empty() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("detached publish never reached the client");
    }
}
