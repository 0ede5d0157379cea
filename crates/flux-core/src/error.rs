//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// Every variant is fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("At least one region must be configured")]
    NoRegions,

    #[error("Region '{0}' is configured more than once")]
    DuplicateRegion(String),

    #[error("Emitter count must be greater than zero")]
    NoEmitters,

    #[error("max_concurrency must be greater than zero")]
    InvalidConcurrency,

    #[error("flush_batch_size must be greater than zero")]
    InvalidBatchSize,

    #[error("flush_queue_depth must be greater than zero")]
    InvalidQueueDepth,

    #[error("No streams configured")]
    EmptyStreams,

    #[error("Stream '{stream}' has invalid weight {weight}")]
    InvalidWeight { stream: String, weight: f64 },

    #[error("All stream weights are zero")]
    AllWeightsZero,

    #[error("Stream '{stream}' has invalid {field}: {value}")]
    InvalidTiming {
        stream: String,
        field: &'static str,
        value: f64,
    },

    #[error("Stream '{0}' has no event generator")]
    UnknownStream(String),

    #[error("Invalid {field}: {value}")]
    InvalidSetting { field: &'static str, value: String },

    #[error("Sink '{name}' is misconfigured: {reason}")]
    InvalidSink { name: String, reason: String },
}
