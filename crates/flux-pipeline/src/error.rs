//! Pipeline error types.

use flux_core::ConfigError;
use flux_generator::GeneratorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// The region buffer no longer accepts events (shutdown in progress)
    #[error("Region buffer '{0}' is closed")]
    Closed(String),

    #[error("Rate limiter is closed")]
    LimiterClosed,

    #[error("Worker has already been started")]
    AlreadyStarted,
}
