//! Message-queue sink.
//!
//! Events are published one message each to topic `<prefix>.<region>`,
//! keyed by user id. A failed publish is retried up to `max_retries`
//! attempts in total, waiting `retry_backoff * attempt` between attempts.
//! An event that exhausts its attempts is dropped and counted as failed;
//! the rest of the batch is still published.

use crate::error::SinkError;
use crate::metrics::SinkMetricsRecorder;
use crate::traits::Sink;
use flux_core::{Batch, Event, QueueSinkConfig, SinkKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Transport used by [`QueueSink`] to publish single messages.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync + Sized {
    /// Open a producer for the configured brokers.
    async fn connect(config: &QueueSinkConfig) -> Result<Self, SinkError>;

    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), SinkError>;

    /// Wait for in-flight messages before shutdown.
    async fn flush(&self) -> Result<(), SinkError>;
}

pub struct QueueSink<P: Publisher> {
    name: String,
    config: QueueSinkConfig,
    publisher: OnceCell<P>,
    closed: AtomicBool,
    recorder: SinkMetricsRecorder,
}

impl<P: Publisher> QueueSink<P> {
    /// Create a sink that connects on [`Sink::initialize`].
    pub fn new(name: impl Into<String>, config: QueueSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            publisher: OnceCell::new(),
            closed: AtomicBool::new(false),
            recorder: SinkMetricsRecorder::new(),
        }
    }

    /// Create a sink around an already connected publisher.
    pub fn with_publisher(name: impl Into<String>, config: QueueSinkConfig, publisher: P) -> Self {
        Self {
            name: name.into(),
            config,
            publisher: OnceCell::new_with(Some(publisher)),
            closed: AtomicBool::new(false),
            recorder: SinkMetricsRecorder::new(),
        }
    }

    pub fn publisher(&self) -> Option<&P> {
        self.publisher.get()
    }

    /// Publish one message, retrying with linear backoff.
    ///
    /// Returns whether the message was eventually accepted.
    async fn publish_with_retry(&self, publisher: &P, topic: &str, key: &str, payload: &[u8]) -> bool {
        let attempts = self.config.max_retries.max(1);
        for attempt in 1..=attempts {
            match publisher.publish(topic, key, payload).await {
                Ok(()) => return true,
                Err(e) => {
                    debug!(sink = %self.name, topic, attempt, error = %e, "Publish attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_backoff() * attempt).await;
                    }
                }
            }
        }
        false
    }
}

#[async_trait::async_trait]
impl<P: Publisher + 'static> Sink for QueueSink<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Queue
    }

    async fn initialize(&self) -> Result<(), SinkError> {
        self.publisher
            .get_or_try_init(|| P::connect(&self.config))
            .await
            .map_err(|e| SinkError::Init {
                sink: self.name.clone(),
                reason: e.to_string(),
            })?;
        info!(sink = %self.name, brokers = %self.config.brokers, "Queue sink connected");
        Ok(())
    }

    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(SinkError::Closed(self.name.clone()));
        }
        let publisher = self.publisher.get().ok_or_else(|| SinkError::Delivery {
            sink: self.name.clone(),
            reason: "not initialized".to_string(),
        })?;

        let topic = self.config.topic_for(&batch.region);
        let start = Instant::now();
        let mut delivered = 0;
        let mut failed = 0;

        for event in &batch.events {
            let payload = match encode_event(event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(sink = %self.name, event_id = %event.event_id, error = %e, "Failed to encode event");
                    failed += 1;
                    continue;
                }
            };
            if self
                .publish_with_retry(publisher, &topic, &event.user_id, &payload)
                .await
            {
                delivered += 1;
            } else {
                warn!(sink = %self.name, topic = %topic, event_id = %event.event_id, "Dropping event after retries");
                failed += 1;
            }
        }

        self.recorder.record(delivered, failed, start.elapsed());
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        if let Some(publisher) = self.publisher.get() {
            publisher.flush().await?;
        }
        Ok(())
    }

    fn recorder(&self) -> &SinkMetricsRecorder {
        &self.recorder
    }
}

/// One queue message: the event's JSON encoding.
fn encode_event(event: &Event) -> Result<Vec<u8>, SinkError> {
    Ok(serde_json::to_vec(event)?)
}
