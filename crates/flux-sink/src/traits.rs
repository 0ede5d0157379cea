//! The `Sink` trait.

use crate::error::SinkError;
use crate::metrics::{SinkMetrics, SinkMetricsRecorder};
use flux_core::{Batch, SinkKind};

/// A delivery target for sealed batches.
///
/// Sinks are long-lived and shared between region flushers, so every method
/// takes `&self`.
///
/// # Contract
///
/// - `initialize` performs one-time setup and is safe to call again.
/// - `deliver` records its own successes (and any per-event failures) in
///   [`Sink::recorder`]. It returns an error only when the whole batch could
///   not be delivered; the caller then counts the batch as failed.
/// - `close` releases resources and is safe to call more than once.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Configured sink name.
    fn name(&self) -> &str;

    fn kind(&self) -> SinkKind;

    async fn initialize(&self) -> Result<(), SinkError>;

    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError>;

    async fn close(&self) -> Result<(), SinkError>;

    fn recorder(&self) -> &SinkMetricsRecorder;

    fn metrics(&self) -> SinkMetrics {
        self.recorder().snapshot()
    }
}
