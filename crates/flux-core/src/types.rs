//! Users, events and sealed batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// A simulated user.
///
/// Users are created once when the pool is built and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub region: String,
    pub device_ids: Vec<String>,
}

impl User {
    pub fn new(user_id: impl Into<String>, region: impl Into<String>, device_ids: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            region: region.into(),
            device_ids,
        }
    }
}

/// A single synthetic telemetry event.
///
/// The common envelope fields are serialized alongside the stream-specific
/// fields, which are flattened into the same JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub user_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub stream: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Create an event with a fresh UUID v4 id and the current UTC timestamp.
    pub fn new(
        stream: impl Into<String>,
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            device_id: device_id.into(),
            timestamp: Utc::now(),
            stream: stream.into(),
            fields,
        }
    }

    /// Size of the event's JSON encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

/// A sealed, ordered run of events for one region.
///
/// `sequence` increases by one for every batch sealed in the same region, so
/// sinks can verify that they observe batches in seal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub region: String,
    pub sequence: u64,
    pub events: Vec<Event>,
}

impl Batch {
    pub fn new(region: impl Into<String>, sequence: u64, events: Vec<Event>) -> Self {
        Self {
            region: region.into(),
            sequence,
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Convert fractional seconds from configuration into a [`Duration`].
///
/// Negative, NaN and overflowing values map to zero.
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}
