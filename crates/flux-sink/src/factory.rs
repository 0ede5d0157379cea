//! Sink construction from configuration.

use crate::error::SinkError;
use crate::http::HttpSink;
use crate::kafka::KafkaPublisher;
use crate::mock::MockSink;
use crate::queue::QueueSink;
use crate::traits::Sink;
use flux_core::SinkConfig;
use std::sync::Arc;

/// Build the sink variant selected by the config's `type` tag.
///
/// The sink is not initialized yet.
pub fn create_sink(name: &str, config: &SinkConfig) -> Result<Arc<dyn Sink>, SinkError> {
    let sink: Arc<dyn Sink> = match config {
        SinkConfig::Mock(mock) => Arc::new(MockSink::new(name, mock)),
        SinkConfig::Http(http) => Arc::new(HttpSink::new(name, http.clone())),
        SinkConfig::Queue(queue) => Arc::new(QueueSink::<KafkaPublisher>::new(name, queue.clone())),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_core::{HttpSinkConfig, MockSinkConfig, QueueSinkConfig, SinkKind};

    #[test]
    fn test_factory_selects_variant() {
        let mock = create_sink("m", &SinkConfig::Mock(MockSinkConfig::default())).unwrap();
        assert_eq!(mock.kind(), SinkKind::Mock);
        assert_eq!(mock.name(), "m");

        let http = create_sink(
            "h",
            &SinkConfig::Http(HttpSinkConfig::new("http://localhost:8000/ingest")),
        )
        .unwrap();
        assert_eq!(http.kind(), SinkKind::Http);

        let queue = create_sink("q", &SinkConfig::Queue(QueueSinkConfig::default())).unwrap();
        assert_eq!(queue.kind(), SinkKind::Queue);
    }
}
