//! Kafka transport for the queue sink.

use crate::error::SinkError;
use crate::queue::Publisher;
use flux_core::QueueSinkConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;

/// [`Publisher`] backed by an rdkafka [`FutureProducer`].
///
/// Client-side retries are disabled; the queue sink owns the retry policy.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaPublisher {
    /// Build the producer configuration for `config`.
    pub fn client_config(config: &QueueSinkConfig) -> ClientConfig {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", &config.brokers)
            .set("acks", config.acks.as_acks())
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("retries", "0")
            .set("linger.ms", "5");
        client
    }
}

#[async_trait::async_trait]
impl Publisher for KafkaPublisher {
    async fn connect(config: &QueueSinkConfig) -> Result<Self, SinkError> {
        let producer: FutureProducer = Self::client_config(config).create()?;
        Ok(Self {
            producer,
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }

    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), SinkError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        self.producer
            .send(record, self.send_timeout)
            .await
            .map(|_| ())
            .map_err(|(err, _)| SinkError::from(err))
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let producer = self.producer.clone();
        let timeout = self.send_timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| SinkError::Queue(e.to_string()))??;
        Ok(())
    }
}
