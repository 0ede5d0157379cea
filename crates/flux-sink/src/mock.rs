//! In-memory sink.

use crate::error::SinkError;
use crate::metrics::SinkMetricsRecorder;
use crate::traits::Sink;
use flux_core::{Batch, Event, MockSinkConfig, SinkKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Sink that keeps delivered batches in memory.
///
/// Always succeeds with zero latency. Only the most recent
/// `retain_batches` batches are kept; older ones are still counted.
#[derive(Debug)]
pub struct MockSink {
    name: String,
    retain: usize,
    batches: Mutex<VecDeque<Batch>>,
    events_received: AtomicU64,
    initialized: AtomicBool,
    closed: AtomicBool,
    recorder: SinkMetricsRecorder,
}

impl MockSink {
    pub fn new(name: impl Into<String>, config: &MockSinkConfig) -> Self {
        Self {
            name: name.into(),
            retain: config.retain_batches,
            batches: Mutex::new(VecDeque::new()),
            events_received: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            recorder: SinkMetricsRecorder::new(),
        }
    }

    /// Retained batches in delivery order.
    pub fn batches(&self) -> Vec<Batch> {
        self.lock().iter().cloned().collect()
    }

    /// Events of the retained batches in delivery order.
    pub fn events(&self) -> Vec<Event> {
        self.lock()
            .iter()
            .flat_map(|batch| batch.events.iter().cloned())
            .collect()
    }

    /// Every event ever delivered, retained or not.
    pub fn event_count(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Batch>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl Sink for MockSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Mock
    }

    async fn initialize(&self) -> Result<(), SinkError> {
        self.initialized.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed(self.name.clone()));
        }
        {
            let mut batches = self.lock();
            if self.retain > 0 {
                if batches.len() == self.retain {
                    batches.pop_front();
                }
                batches.push_back(batch.clone());
            }
        }
        self.events_received
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        self.recorder.record_success(batch.len(), Duration::ZERO);
        debug!(sink = %self.name, region = %batch.region, events = batch.len(), "Mock sink stored batch");
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn recorder(&self) -> &SinkMetricsRecorder {
        &self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn batch(region: &str, sequence: u64, size: usize) -> Batch {
        let events = (0..size)
            .map(|i| Event::new("video_logs", format!("u{i:06}"), "d000000", Map::new()))
            .collect();
        Batch::new(region, sequence, events)
    }

    #[tokio::test]
    async fn test_stores_and_counts() {
        let sink = MockSink::new("mock", &MockSinkConfig::default());
        sink.initialize().await.unwrap();
        sink.initialize().await.unwrap();
        assert!(sink.is_initialized());

        sink.deliver(&batch("us", 0, 3)).await.unwrap();
        sink.deliver(&batch("us", 1, 2)).await.unwrap();

        assert_eq!(sink.event_count(), 5);
        assert_eq!(sink.events().len(), 5);
        let sequences: Vec<u64> = sink.batches().iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);

        let metrics = sink.metrics();
        assert_eq!(metrics.success_count, 5);
        assert_eq!(metrics.fail_count, 0);
        assert_eq!(metrics.mean_latency_ms, 0.0);
    }

    #[tokio::test]
    async fn test_retention_limit() {
        let sink = MockSink::new("mock", &MockSinkConfig { retain_batches: 2 });
        for seq in 0..5 {
            sink.deliver(&batch("us", seq, 1)).await.unwrap();
        }
        let sequences: Vec<u64> = sink.batches().iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![3, 4]);
        assert_eq!(sink.event_count(), 5);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let sink = MockSink::new("mock", &MockSinkConfig::default());
        sink.close().await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.is_closed());
        assert!(matches!(
            sink.deliver(&batch("us", 0, 1)).await,
            Err(SinkError::Closed(_))
        ));
    }
}
