#![allow(dead_code)]

use async_trait::async_trait;
use kafka_log_pipe::publisher::{BrokerClient, DeliveryError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Stub broker that records every published payload, optionally failing
/// every attempt.
pub struct RecordingClient {
    published: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingClient {
            published: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(RecordingClient {
            published: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerClient for RecordingClient {
    async fn publish(&self, _topic: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Rejected("stub broker failure".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }
}

/// Stub broker whose publishes park on a gate until the test releases
/// permits. Lets tests hold the drain worker mid-delivery so the queue
/// fills deterministically.
pub struct GatedClient {
    published: Mutex<Vec<String>>,
    attempts: AtomicU64,
    gate: Semaphore,
}

impl GatedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(GatedClient {
            published: Mutex::new(Vec::new()),
            attempts: AtomicU64::new(0),
            gate: Semaphore::new(0),
        })
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    pub fn lines(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    /// Spin until at least `n` publish attempts have started.
    pub fn wait_for_attempts(&self, n: u64) {
        for _ in 0..200 {
            if self.attempts.load(Ordering::Relaxed) >= n {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("expected {n} publish attempts, saw {}", self.attempts.load(Ordering::Relaxed));
    }
}

#[async_trait]
impl BrokerClient for GatedClient {
    async fn publish(&self, _topic: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        self.published
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }
}

/// Stub broker that delays early publishes longer than later ones.
/// Out-of-order dispatch lets a late payload overtake an early one, so
/// arrival order only matches submission order when sends are
/// serialized.
pub struct DelayedClient {
    published: Mutex<Vec<String>>,
    arrivals: AtomicU64,
}

impl DelayedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(DelayedClient {
            published: Mutex::new(Vec::new()),
            arrivals: AtomicU64::new(0),
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerClient for DelayedClient {
    async fn publish(&self, _topic: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        let arrival = self.arrivals.fetch_add(1, Ordering::Relaxed);
        let delay = 100u64.saturating_sub(arrival * 10);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.published
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }
}

/// Spin until `cond` holds, panicking after five seconds.
pub fn wait_until(label: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {label}");
}

/// Extract the `message` field from a published JSON event line.
pub fn message_of(line: &str) -> String {
    let doc: serde_json::Value = serde_json::from_str(line.trim_end()).expect("valid event JSON");
    doc["message"].as_str().expect("message field").to_string()
}
