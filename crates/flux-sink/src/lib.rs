//! Delivery targets for DataFlux batches.
//!
//! Three variants implement the [`Sink`] trait:
//!
//! - [`MockSink`]: keeps batches in memory, always succeeds
//! - [`HttpSink`]: one JSON `POST` per batch
//! - [`QueueSink`]: one message per event with per-event retries, over a
//!   [`Publisher`] such as [`KafkaPublisher`]
//!
//! [`create_sink`] picks the variant from a [`SinkConfig`](flux_core::SinkConfig).
//! Every sink owns a [`SinkMetricsRecorder`] that the metrics exporter reads.

pub mod error;
pub mod factory;
pub mod http;
pub mod kafka;
pub mod metrics;
pub mod mock;
pub mod queue;
pub mod traits;

pub use error::SinkError;
pub use factory::create_sink;
pub use http::HttpSink;
pub use kafka::KafkaPublisher;
pub use metrics::{SinkMetrics, SinkMetricsRecorder};
pub use mock::MockSink;
pub use queue::{Publisher, QueueSink};
pub use traits::Sink;
