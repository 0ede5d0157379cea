use flux_sink::SinkMetrics;
use std::collections::BTreeMap;

/// Read-only view of every sink's metrics, keyed by sink name.
pub trait SinkMetricsSource: Send + Sync {
    fn sink_metrics(&self) -> BTreeMap<String, SinkMetrics>;
}
