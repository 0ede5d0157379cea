//! Sink ownership, routing and fan-out.

use flux_core::{Batch, FluxConfig, DEFAULT_ROUTE};
use flux_metrics::{MetricsAggregator, SinkMetricsSource};
use flux_sink::{create_sink, Sink, SinkMetrics};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Owns every sink and the pre-compiled region routing table.
///
/// Routes are resolved to sink handles once at construction, so a flush never
/// looks a name up. A region without its own route uses the `default` route;
/// when no `default` route is configured, that means every sink.
pub struct SinkRegistry {
    sinks: BTreeMap<String, Arc<dyn Sink>>,
    routes: HashMap<String, Vec<Arc<dyn Sink>>>,
    default_route: Vec<Arc<dyn Sink>>,
    aggregator: Arc<MetricsAggregator>,
}

impl SinkRegistry {
    /// Create and initialize every configured sink.
    ///
    /// A sink that fails to build or initialize is logged and left out; the
    /// registry carries on with the rest.
    pub async fn from_config(config: &FluxConfig, aggregator: Arc<MetricsAggregator>) -> Self {
        let mut sinks = Vec::new();
        for (name, sink_config) in &config.sinks {
            let sink = match create_sink(name, sink_config) {
                Ok(sink) => sink,
                Err(e) => {
                    error!(sink = %name, error = %e, "Failed to create sink, continuing without it");
                    continue;
                }
            };
            match sink.initialize().await {
                Ok(()) => {
                    info!(sink = %name, kind = %sink.kind(), "Sink initialized");
                    sinks.push(sink);
                }
                Err(e) => {
                    error!(sink = %name, error = %e, "Failed to initialize sink, continuing without it");
                }
            }
        }
        Self::with_sinks(sinks, &config.region_sinks, aggregator)
    }

    /// Build a registry around already initialized sinks.
    pub fn with_sinks(
        sinks: Vec<Arc<dyn Sink>>,
        region_sinks: &BTreeMap<String, Vec<String>>,
        aggregator: Arc<MetricsAggregator>,
    ) -> Self {
        let sinks: BTreeMap<String, Arc<dyn Sink>> = sinks
            .into_iter()
            .map(|sink| (sink.name().to_string(), sink))
            .collect();

        let mut routes = HashMap::new();
        let mut default_route = None;
        for (region, names) in region_sinks {
            let route = compile_route(region, names, &sinks);
            if region == DEFAULT_ROUTE {
                default_route = Some(route);
            } else {
                routes.insert(region.clone(), route);
            }
        }
        let default_route = default_route.unwrap_or_else(|| sinks.values().cloned().collect());

        if sinks.is_empty() {
            warn!("No sinks available, flushed batches will only be counted");
        }

        Self {
            sinks,
            routes,
            default_route,
            aggregator,
        }
    }

    /// Sinks a batch from `region` is delivered to, in route order.
    pub fn route(&self, region: &str) -> &[Arc<dyn Sink>] {
        self.routes
            .get(region)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_route)
    }

    pub fn sink(&self, name: &str) -> Option<&Arc<dyn Sink>> {
        self.sinks.get(name)
    }

    pub fn sink_names(&self) -> impl Iterator<Item = &str> {
        self.sinks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Count the batch once, then deliver it to every routed sink.
    ///
    /// Deliveries run concurrently and are isolated from each other: an
    /// error or panic in one sink is recorded as `batch.len()` failed events
    /// for that sink and never reaches the caller or the other sinks.
    pub async fn flush(&self, batch: &Batch) {
        if batch.is_empty() {
            return;
        }
        self.aggregator.record_batch(batch);
        join_all(
            self.route(&batch.region)
                .iter()
                .map(|sink| deliver_isolated(sink.as_ref(), batch)),
        )
        .await;
    }

    pub fn all_metrics(&self) -> BTreeMap<String, SinkMetrics> {
        self.sinks
            .iter()
            .map(|(name, sink)| (name.clone(), sink.metrics()))
            .collect()
    }

    /// Close every sink. Failures are logged and do not stop other closes.
    pub async fn close_all(&self) {
        let closes = self.sinks.values().map(|sink| async move {
            match AssertUnwindSafe(sink.close()).catch_unwind().await {
                Ok(Ok(())) => info!(sink = %sink.name(), "Sink closed"),
                Ok(Err(e)) => error!(sink = %sink.name(), error = %e, "Failed to close sink"),
                Err(_) => error!(sink = %sink.name(), "Sink panicked while closing"),
            }
        });
        join_all(closes).await;
    }
}

impl SinkMetricsSource for SinkRegistry {
    fn sink_metrics(&self) -> BTreeMap<String, SinkMetrics> {
        self.all_metrics()
    }
}

fn compile_route(
    region: &str,
    names: &[String],
    sinks: &BTreeMap<String, Arc<dyn Sink>>,
) -> Vec<Arc<dyn Sink>> {
    names
        .iter()
        .filter_map(|name| match sinks.get(name) {
            Some(sink) => Some(sink.clone()),
            None => {
                warn!(region, sink = %name, "Route references an unknown sink, skipping it");
                None
            }
        })
        .collect()
}

async fn deliver_isolated(sink: &dyn Sink, batch: &Batch) {
    let start = Instant::now();
    let outcome = AssertUnwindSafe(sink.deliver(batch)).catch_unwind().await;
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            sink.recorder().record_failure(batch.len(), start.elapsed());
            warn!(
                sink = %sink.name(),
                region = %batch.region,
                events = batch.len(),
                error = %e,
                "Batch delivery failed"
            );
        }
        Err(_) => {
            sink.recorder().record_failure(batch.len(), start.elapsed());
            error!(
                sink = %sink.name(),
                region = %batch.region,
                events = batch.len(),
                "Sink panicked during delivery"
            );
        }
    }
}
