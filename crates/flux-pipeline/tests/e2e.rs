//! End-to-end pipeline tests with in-memory sinks.

use flux_core::{Batch, FluxConfig, MetricsConfig, MockSinkConfig, SinkKind, DEFAULT_ROUTE};
use flux_generator::DefaultEventFactory;
use flux_metrics::MetricsAggregator;
use flux_pipeline::{RegionBuffers, SinkRegistry, Worker, WorkerState};
use flux_sink::{MockSink, Sink, SinkError, SinkMetricsRecorder};
use serde_json::Map;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn default_route(names: &[&str]) -> BTreeMap<String, Vec<String>> {
    let mut routes = BTreeMap::new();
    routes.insert(
        DEFAULT_ROUTE.to_string(),
        names.iter().map(|n| n.to_string()).collect(),
    );
    routes
}

#[tokio::test]
async fn test_three_appends_reach_mock_sink() {
    let aggregator = Arc::new(MetricsAggregator::new(&MetricsConfig::default()));
    let mock = Arc::new(MockSink::new("mock", &MockSinkConfig::default()));
    let registry = Arc::new(SinkRegistry::with_sinks(
        vec![mock.clone() as Arc<dyn Sink>],
        &default_route(&["mock"]),
        aggregator.clone(),
    ));
    let (buffers, flushers) = RegionBuffers::spawn(&["us".to_string()], 3, 8, registry);

    let events: Vec<_> = (0..3)
        .map(|i| flux_core::Event::new("video_logs", format!("u{i:06}"), "d000000", Map::new()))
        .collect();
    for event in events.clone() {
        buffers.append(event, "us").await.unwrap();
    }
    assert_eq!(buffers.len("us").await.unwrap(), 0);

    buffers.close().await;
    flushers.join().await;

    assert_eq!(mock.events(), events);
    assert_eq!(mock.batches().len(), 1);
    assert_eq!(aggregator.counters().total_events(), 3);
}

/// Sink that fails every delivery.
struct RejectingSink {
    recorder: SinkMetricsRecorder,
}

#[async_trait::async_trait]
impl Sink for RejectingSink {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Http
    }

    async fn initialize(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn deliver(&self, _batch: &Batch) -> Result<(), SinkError> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Err(SinkError::Status {
            status: 500,
            body: String::new(),
        })
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn recorder(&self) -> &SinkMetricsRecorder {
        &self.recorder
    }
}

fn worker_config(batch_size: usize) -> FluxConfig {
    FluxConfig::from_yaml(&format!(
        r#"
regions:
  - name: us
  - name: eu
emitters: 20
max_concurrency: 5
seed: 11
streams:
  video_logs: {{ weight: 3, interval_sec: 0.005 }}
  device_telemetry: {{ weight: 1, interval_sec: 0.005 }}
flush_batch_size: {batch_size}
metrics:
  tick_interval_sec: 0.05
"#
    ))
    .unwrap()
}

#[tokio::test]
async fn test_worker_drains_every_event() {
    let config = worker_config(7);
    let aggregator = Arc::new(MetricsAggregator::new(&config.metrics));
    let mock = Arc::new(MockSink::new("mock", &MockSinkConfig { retain_batches: 0 }));
    let rejecting = Arc::new(RejectingSink {
        recorder: SinkMetricsRecorder::new(),
    });
    let registry = Arc::new(SinkRegistry::with_sinks(
        vec![mock.clone() as Arc<dyn Sink>, rejecting.clone()],
        &BTreeMap::new(),
        aggregator.clone(),
    ));
    let worker = Worker::with_registry(
        config,
        Arc::new(DefaultEventFactory::new()),
        registry,
        aggregator,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let stopper = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        }
    });
    let summary = worker.run(cancel).await.unwrap();
    stopper.await.unwrap();

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert!(summary.snapshot.total_events > 0);
    // Every counted event reached the healthy sink, partial batches included
    assert_eq!(mock.event_count(), summary.snapshot.total_events);
    // And every one of them failed on the rejecting sink
    assert_eq!(summary.sinks["rejecting"].fail_count, summary.snapshot.total_events);
    assert_eq!(summary.sinks["mock"].success_count, summary.snapshot.total_events);
    assert!(mock.is_closed());

    let video = summary.snapshot.stream("video_logs").unwrap();
    assert!(video.events > 0);
}

#[tokio::test]
async fn test_batches_keep_seal_order_per_region() {
    let config = worker_config(5);
    let aggregator = Arc::new(MetricsAggregator::new(&config.metrics));
    let mock = Arc::new(MockSink::new("mock", &MockSinkConfig::default()));
    let registry = Arc::new(SinkRegistry::with_sinks(
        vec![mock.clone() as Arc<dyn Sink>],
        &default_route(&["mock"]),
        aggregator.clone(),
    ));
    let worker = Worker::with_registry(
        config,
        Arc::new(DefaultEventFactory::new()),
        registry,
        aggregator,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let stopper = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        })
    };
    worker.run(cancel).await.unwrap();
    stopper.await.unwrap();

    for region in ["us", "eu"] {
        let sequences: Vec<u64> = mock
            .batches()
            .iter()
            .filter(|b| b.region == region)
            .map(|b| b.sequence)
            .collect();
        let expected: Vec<u64> = (0..sequences.len() as u64).collect();
        assert_eq!(sequences, expected, "region {region}");
    }
    assert!(mock.batches().iter().all(|b| b.len() <= 5));
}

#[tokio::test]
async fn test_time_based_flush_delivers_partial_batches() {
    let mut config = worker_config(10_000);
    config.flush_interval_sec = 0.05;
    let aggregator = Arc::new(MetricsAggregator::new(&config.metrics));
    let mock = Arc::new(MockSink::new("mock", &MockSinkConfig::default()));
    let registry = Arc::new(SinkRegistry::with_sinks(
        vec![mock.clone() as Arc<dyn Sink>],
        &BTreeMap::new(),
        aggregator.clone(),
    ));
    let worker = Arc::new(
        Worker::with_registry(
            config,
            Arc::new(DefaultEventFactory::new()),
            registry,
            aggregator,
        )
        .unwrap(),
    );

    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let worker = worker.clone();
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(400)).await;
    // Batch size is never reached, so only the sealer can have flushed
    assert!(mock.event_count() > 0);

    cancel.cancel();
    run.await.unwrap().unwrap();
}
