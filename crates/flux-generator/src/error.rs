//! Generator error types.

use flux_core::ConfigError;
use thiserror::Error;

/// Errors that can occur while building users or events.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// No generator is registered for the stream
    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    /// A user pool needs at least one region to assign users to
    #[error("Cannot build a user pool without regions")]
    NoRegions,

    #[error("User '{0}' has no devices")]
    NoDevices(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
