//! Sink error types.

use thiserror::Error;

/// Errors raised by sinks.
///
/// `Init` is fatal for the one sink that raised it. Every other variant is a
/// per-batch (or per-event) delivery failure that the registry records and
/// swallows.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink '{sink}' failed to initialize: {reason}")]
    Init { sink: String, reason: String },

    #[error("Sink '{sink}' failed to deliver: {reason}")]
    Delivery { sink: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Sink '{0}' is closed")]
    Closed(String),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<rdkafka::error::KafkaError> for SinkError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        SinkError::Queue(err.to_string())
    }
}
