//! Prometheus exporter.
//!
//! Serves two endpoints:
//!
//! - `GET /metrics`: Prometheus text format with `sink_success`,
//!   `sink_fail` and `sink_flush_latency` (mean ms) labelled by `sink`, plus
//!   worker-wide totals
//! - `GET /stats`: the latest [`MetricsSnapshot`] and per-sink metrics as JSON
//!
//! Sink gauges are refreshed from the [`SinkMetricsSource`] on a fixed poll
//! interval rather than per request.

use crate::aggregator::MetricsAggregator;
use crate::error::ExporterError;
use crate::snapshot::MetricsSnapshot;
use crate::source::SinkMetricsSource;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use flux_core::ExporterConfig;
use flux_sink::SinkMetrics;
use prometheus::{Encoder, Gauge, GaugeVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Body of `GET /stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub snapshot: MetricsSnapshot,
    pub sinks: BTreeMap<String, SinkMetrics>,
}

pub struct PrometheusExporter {
    registry: Registry,
    sink_success: GaugeVec,
    sink_fail: GaugeVec,
    sink_flush_latency: GaugeVec,
    events_total: IntGauge,
    bytes_total: IntGauge,
    rolling_eps: Gauge,
    source: Arc<dyn SinkMetricsSource>,
    aggregator: Arc<MetricsAggregator>,
}

impl PrometheusExporter {
    pub fn new(
        source: Arc<dyn SinkMetricsSource>,
        aggregator: Arc<MetricsAggregator>,
    ) -> Result<Self, ExporterError> {
        let registry = Registry::new();

        let sink_success = GaugeVec::new(
            Opts::new("sink_success", "Number of successful events per sink"),
            &["sink"],
        )?;
        let sink_fail = GaugeVec::new(
            Opts::new("sink_fail", "Number of failed events per sink"),
            &["sink"],
        )?;
        let sink_flush_latency = GaugeVec::new(
            Opts::new("sink_flush_latency", "Mean flush latency per sink in milliseconds"),
            &["sink"],
        )?;
        let events_total = IntGauge::new("dataflux_events_total", "Events flushed by this worker")?;
        let bytes_total = IntGauge::new("dataflux_bytes_total", "Bytes flushed by this worker")?;
        let rolling_eps = Gauge::new("dataflux_rolling_eps", "Events per second over the rolling window")?;

        registry.register(Box::new(sink_success.clone()))?;
        registry.register(Box::new(sink_fail.clone()))?;
        registry.register(Box::new(sink_flush_latency.clone()))?;
        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(bytes_total.clone()))?;
        registry.register(Box::new(rolling_eps.clone()))?;

        Ok(Self {
            registry,
            sink_success,
            sink_fail,
            sink_flush_latency,
            events_total,
            bytes_total,
            rolling_eps,
            source,
            aggregator,
        })
    }

    /// Refresh every gauge from the sink source and the latest snapshot.
    pub fn update(&self) {
        for (name, metrics) in self.source.sink_metrics() {
            let labels = [name.as_str()];
            self.sink_success
                .with_label_values(&labels)
                .set(metrics.success_count as f64);
            self.sink_fail
                .with_label_values(&labels)
                .set(metrics.fail_count as f64);
            self.sink_flush_latency
                .with_label_values(&labels)
                .set(metrics.mean_latency_ms);
        }

        let snapshot = self.aggregator.latest();
        self.events_total.set(snapshot.total_events as i64);
        self.bytes_total.set(snapshot.total_bytes as i64);
        self.rolling_eps.set(snapshot.rolling_eps);
    }

    /// Current gauges in Prometheus text format.
    pub fn render(&self) -> Result<String, ExporterError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn stats(&self) -> StatsResponse {
        StatsResponse {
            snapshot: self.aggregator.latest().as_ref().clone(),
            sinks: self.source.sink_metrics(),
        }
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.clone())
    }

    /// Bind `config.listen` and serve until cancelled.
    pub async fn serve(
        self: Arc<Self>,
        config: &ExporterConfig,
        cancel: CancellationToken,
    ) -> Result<(), ExporterError> {
        let listener = TcpListener::bind(&config.listen)
            .await
            .map_err(|source| ExporterError::Bind {
                addr: config.listen.clone(),
                source,
            })?;
        self.serve_listener(listener, config.poll_interval(), cancel)
            .await
    }

    /// Serve on an already bound listener, polling sinks every `poll_interval`.
    pub async fn serve_listener(
        self: Arc<Self>,
        listener: TcpListener,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<(), ExporterError> {
        let addr = listener.local_addr()?;
        info!(%addr, "Metrics exporter listening");

        self.update();
        let poller = tokio::spawn({
            let exporter = self.clone();
            let cancel = cancel.clone();
            async move {
                let mut interval = tokio::time::interval(poll_interval);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => exporter.update(),
                    }
                }
            }
        });

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .await;
        cancel.cancel();
        if let Err(e) = poller.await {
            error!(error = %e, "Metrics poller panicked");
        }
        Ok(result?)
    }
}

async fn metrics_handler(State(exporter): State<Arc<PrometheusExporter>>) -> Response {
    match exporter.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn stats_handler(State(exporter): State<Arc<PrometheusExporter>>) -> Json<StatsResponse> {
    Json(exporter.stats())
}
