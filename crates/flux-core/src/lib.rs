//! Core types for the DataFlux load generator.
//!
//! This crate holds the data model shared by every other DataFlux crate:
//!
//! - [`User`], [`Event`] and [`Batch`]: the records that flow through the pipeline
//! - [`FluxConfig`]: the YAML configuration consumed by a worker process
//! - [`ConfigError`]: the fatal-at-startup error taxonomy
//!
//! # Data flow
//!
//! ```text
//!   User ──▶ Event ──▶ RegionBuffer ──seal──▶ Batch ──▶ Sink(s)
//! ```
//!
//! Events are immutable once created. A [`Batch`] is an ordered, sealed run of
//! events for one region, numbered by its seal sequence.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AckMode, EmitterCount, ExporterConfig, FluxConfig, HttpSinkConfig, MetricsConfig,
    MockSinkConfig, Mode, QueueSinkConfig, RegionConfig, SinkConfig, SinkKind, StreamConfig,
    DEFAULT_ROUTE,
};
pub use error::ConfigError;
pub use types::{secs_to_duration, Batch, Event, User};
