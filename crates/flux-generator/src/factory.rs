//! Event construction keyed by stream name.

use crate::error::GeneratorError;
use crate::streams;
use flux_core::{ConfigError, Event, User};
use rand::rngs::StdRng;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Builds events for named streams.
///
/// The pipeline only depends on this trait, so callers can plug in their own
/// payloads. Implementations must be cheap to call concurrently from every
/// emitter task.
pub trait EventFactory: Send + Sync {
    /// Whether `stream` has a generator.
    fn supports(&self, stream: &str) -> bool;

    /// Build one event for `stream`, owned by `user` and emitted from `device_id`.
    fn create(
        &self,
        stream: &str,
        user: &User,
        device_id: &str,
        rng: &mut StdRng,
    ) -> Result<Event, GeneratorError>;

    /// Fail on the first configured stream this factory cannot build.
    fn check_streams<'a>(
        &self,
        streams: &mut dyn Iterator<Item = &'a str>,
    ) -> Result<(), ConfigError> {
        for stream in streams {
            if !self.supports(stream) {
                return Err(ConfigError::UnknownStream(stream.to_string()));
            }
        }
        Ok(())
    }
}

/// Signature of a stream field generator.
pub type FieldGenerator = fn(&mut StdRng) -> Map<String, Value>;

/// Factory for the built-in telemetry streams.
///
/// Extra streams can be registered with [`DefaultEventFactory::with_stream`].
#[derive(Clone)]
pub struct DefaultEventFactory {
    generators: BTreeMap<String, FieldGenerator>,
}

impl DefaultEventFactory {
    pub fn new() -> Self {
        let builtin: [(&str, FieldGenerator); 6] = [
            ("video_logs", streams::video_logs),
            ("user_interactions", streams::user_interactions),
            ("device_telemetry", streams::device_telemetry),
            ("recommendation_feedback", streams::recommendation_feedback),
            ("training_data", streams::training_data),
            ("model_telemetry", streams::model_telemetry),
        ];
        Self {
            generators: builtin
                .into_iter()
                .map(|(name, generator)| (name.to_string(), generator))
                .collect(),
        }
    }

    /// Register (or replace) the generator for `stream`.
    pub fn with_stream(mut self, stream: impl Into<String>, generator: FieldGenerator) -> Self {
        self.generators.insert(stream.into(), generator);
        self
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }
}

impl Default for DefaultEventFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultEventFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultEventFactory")
            .field("streams", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventFactory for DefaultEventFactory {
    fn supports(&self, stream: &str) -> bool {
        self.generators.contains_key(stream)
    }

    fn create(
        &self,
        stream: &str,
        user: &User,
        device_id: &str,
        rng: &mut StdRng,
    ) -> Result<Event, GeneratorError> {
        let generator = self
            .generators
            .get(stream)
            .ok_or_else(|| GeneratorError::UnknownStream(stream.to_string()))?;
        Ok(Event::new(
            stream,
            user.user_id.as_str(),
            device_id,
            generator(rng),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use serde_json::json;

    fn user() -> User {
        User::new("u000042", "us", vec!["dabcdef".to_string()])
    }

    #[test]
    fn test_builtin_streams() {
        let factory = DefaultEventFactory::new();
        let names: Vec<&str> = factory.stream_names().collect();
        assert_eq!(
            names,
            vec![
                "device_telemetry",
                "model_telemetry",
                "recommendation_feedback",
                "training_data",
                "user_interactions",
                "video_logs",
            ]
        );
    }

    #[test]
    fn test_create_sets_envelope() {
        let factory = DefaultEventFactory::new();
        let mut rng = StdRng::seed_from_u64(42);
        let event = factory
            .create("video_logs", &user(), "dabcdef", &mut rng)
            .unwrap();

        assert_eq!(event.stream, "video_logs");
        assert_eq!(event.user_id, "u000042");
        assert_eq!(event.device_id, "dabcdef");
        assert!(event.fields.contains_key("video_id"));
        assert!(uuid_like(&event.event_id));
    }

    fn uuid_like(id: &str) -> bool {
        id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
    }

    #[test]
    fn test_unknown_stream() {
        let factory = DefaultEventFactory::new();
        let mut rng = StdRng::seed_from_u64(42);
        let result = factory.create("clickstream", &user(), "dabcdef", &mut rng);
        assert!(matches!(result, Err(GeneratorError::UnknownStream(s)) if s == "clickstream"));
    }

    #[test]
    fn test_custom_stream() {
        fn heartbeat(_rng: &mut StdRng) -> Map<String, Value> {
            let mut fields = Map::new();
            fields.insert("alive".to_string(), json!(true));
            fields
        }

        let factory = DefaultEventFactory::new().with_stream("heartbeat", heartbeat);
        let mut rng = StdRng::seed_from_u64(1);
        let event = factory
            .create("heartbeat", &user(), "dabcdef", &mut rng)
            .unwrap();
        assert_eq!(event.fields["alive"], json!(true));
    }

    #[test]
    fn test_check_streams() {
        let factory = DefaultEventFactory::new();
        assert!(factory
            .check_streams(&mut ["video_logs", "training_data"].into_iter())
            .is_ok());

        let result = factory.check_streams(&mut ["video_logs", "bogus"].into_iter());
        assert!(matches!(result, Err(ConfigError::UnknownStream(s)) if s == "bogus"));
    }
}
