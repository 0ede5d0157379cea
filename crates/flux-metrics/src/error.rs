//! Exporter error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Metrics server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
