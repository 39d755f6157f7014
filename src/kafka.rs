use crate::config::{ConfigError, DeliveryConfig};
use crate::publisher::{BrokerClient, DeliveryError};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use std::time::Duration;

const DEFAULT_ENQUEUE_TIMEOUT_MS: u64 = 60_000;

/// Kafka implementation of [`BrokerClient`] publishing each event
/// document as an unkeyed message to the configured topic.
pub struct KafkaClient {
    producer: FutureProducer,
    enqueue_timeout: Duration,
}

impl KafkaClient {
    /// Build a producer from the delivery configuration. Fails only on
    /// invalid client properties; no connection is attempted here.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, ConfigError> {
        let producer: FutureProducer = client_config(config)
            .create()
            .map_err(|err| ConfigError::Client(err.to_string()))?;

        Ok(KafkaClient {
            producer,
            enqueue_timeout: Duration::from_millis(
                config.max_block_ms.unwrap_or(DEFAULT_ENQUEUE_TIMEOUT_MS),
            ),
        })
    }
}

/// Map the delivery configuration onto librdkafka properties. Security
/// parameters are forwarded as-is; options with no librdkafka
/// equivalent are accepted but not forwarded: JAAS and krb5 config
/// paths (librdkafka configures SASL directly), the truststore
/// password (`ssl.ca.location` takes an unencrypted PEM file) and the
/// keystore type (librdkafka only reads PKCS#12 keystores).
fn client_config(config: &DeliveryConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", config.broker_list.join(","));

    if let Some(acks) = config.required_num_acks {
        client.set("acks", acks.to_string());
    }
    if let Some(retries) = config.retries {
        client.set("retries", retries.to_string());
    }
    if let Some(ms) = config.delivery_timeout_ms {
        client.set("delivery.timeout.ms", ms.to_string());
    }
    if let Some(codec) = &config.compression_type {
        client.set("compression.type", codec.as_str());
    }

    let security = &config.security;
    if let Some(protocol) = &security.security_protocol {
        client.set("security.protocol", protocol.as_str());
    }
    if let Some(location) = &security.ssl_truststore_location {
        client.set("ssl.ca.location", location.as_str());
    }
    if let Some(location) = &security.ssl_keystore_location {
        client.set("ssl.keystore.location", location.as_str());
    }
    if let Some(password) = &security.ssl_keystore_password {
        client.set("ssl.keystore.password", password.as_str());
    }
    if let Some(service) = &security.sasl_kerberos_service_name {
        client.set("sasl.kerberos.service.name", service.as_str());
    }

    client
}

#[async_trait]
impl BrokerClient for KafkaClient {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        let record = FutureRecord::<(), _>::to(topic).payload(payload);
        self.producer
            .send(record, self.enqueue_timeout)
            .await
            .map(|_| ())
            .map_err(|(err, _)| match err {
                KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
                    DeliveryError::Timeout(self.enqueue_timeout)
                }
                other => DeliveryError::Transport(Box::new(other)),
            })
    }

    fn close(&self, grace: Duration) {
        let _ = self.producer.flush(grace);
    }
}
