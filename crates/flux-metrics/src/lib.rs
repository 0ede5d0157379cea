//! Throughput metrics for DataFlux.
//!
//! [`MetricsAggregator`] counts every flushed batch once and, on each tick,
//! pushes the per-tick deltas into a rolling and a global [`RollingWindow`]
//! before publishing an immutable [`MetricsSnapshot`].
//!
//! [`PrometheusExporter`] exposes per-sink gauges read from a
//! [`SinkMetricsSource`] together with the latest snapshot.

pub mod aggregator;
pub mod counters;
pub mod error;
pub mod exporter;
pub mod snapshot;
pub mod source;
pub mod window;

pub use aggregator::MetricsAggregator;
pub use counters::{EventCounters, StreamTotals};
pub use error::ExporterError;
pub use exporter::{PrometheusExporter, StatsResponse};
pub use snapshot::{MetricsSnapshot, StreamSnapshot};
pub use source::SinkMetricsSource;
pub use window::RollingWindow;
