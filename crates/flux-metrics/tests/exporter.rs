//! Exporter HTTP surface tests.

use flux_core::{Batch, Event, MetricsConfig};
use flux_metrics::{MetricsAggregator, PrometheusExporter, SinkMetricsSource};
use flux_sink::SinkMetrics;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct FixedSource;

impl SinkMetricsSource for FixedSource {
    fn sink_metrics(&self) -> BTreeMap<String, SinkMetrics> {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "mock".to_string(),
            SinkMetrics {
                success_count: 5,
                fail_count: 0,
                flushes: 1,
                latency_samples_ms: vec![0.0],
                mean_latency_ms: 0.0,
            },
        );
        metrics.insert(
            "ingest".to_string(),
            SinkMetrics {
                success_count: 2,
                fail_count: 3,
                flushes: 2,
                latency_samples_ms: vec![10.0, 30.0],
                mean_latency_ms: 20.0,
            },
        );
        metrics
    }
}

fn exporter() -> Arc<PrometheusExporter> {
    let aggregator = Arc::new(MetricsAggregator::new(&MetricsConfig::default()));
    let events = (0..5)
        .map(|i| Event::new("video_logs", format!("u{i:06}"), "d000000", Map::new()))
        .collect();
    aggregator.record_batch(&Batch::new("us", 0, events));
    aggregator.tick();
    Arc::new(PrometheusExporter::new(Arc::new(FixedSource), aggregator).unwrap())
}

#[test]
fn test_render_contains_sink_gauges() {
    let exporter = exporter();
    exporter.update();
    let text = exporter.render().unwrap();

    assert!(text.contains(r#"sink_success{sink="mock"} 5"#), "{text}");
    assert!(text.contains(r#"sink_fail{sink="ingest"} 3"#), "{text}");
    assert!(text.contains(r#"sink_flush_latency{sink="ingest"} 20"#), "{text}");
    assert!(text.contains("dataflux_events_total 5"), "{text}");
}

#[tokio::test]
async fn test_serves_metrics_and_stats() {
    let exporter = exporter();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();

    let server = tokio::spawn({
        let exporter = exporter.clone();
        let cancel = cancel.clone();
        async move {
            exporter
                .serve_listener(listener, Duration::from_millis(50), cancel)
                .await
        }
    });

    let metrics = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains(r#"sink_success{sink="mock"} 5"#));

    let stats: Value = reqwest::get(format!("http://{addr}/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["snapshot"]["total_events"], 5);
    assert_eq!(stats["sinks"]["ingest"]["fail_count"], 3);

    cancel.cancel();
    server.await.unwrap().unwrap();
}
