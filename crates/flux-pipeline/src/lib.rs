//! The DataFlux emission pipeline.
//!
//! ```text
//!  EmitterSupervisor (one task per user)
//!     │  RateLimiter permit
//!     │  StreamSelector + EventFactory
//!     ▼
//!  RegionBuffers ──seal──▶ per-region flusher ──▶ SinkRegistry ──▶ Sink, Sink, ...
//!                                                     │
//!                                                     ▼
//!                                              MetricsAggregator
//! ```
//!
//! [`Worker`] wires these together and drives the
//! INIT → RUNNING → DRAINING → STOPPED lifecycle.

pub mod buffer;
pub mod emitter;
pub mod error;
pub mod limiter;
pub mod registry;
pub mod worker;

pub use buffer::{Flushers, RegionBuffers};
pub use emitter::{EmitterContext, EmitterSupervisor};
pub use error::PipelineError;
pub use limiter::{EmissionPermit, RateLimiter};
pub use registry::SinkRegistry;
pub use worker::{Worker, WorkerState, WorkerSummary};
