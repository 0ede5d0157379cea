//! Point-in-time throughput view.

use serde::Serialize;

const MIB: f64 = 1024.0 * 1024.0;

/// One stream's line in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSnapshot {
    pub name: String,
    pub events: u64,
    pub bytes: u64,
    /// Share of all events, 0 when nothing was counted yet
    pub percent: f64,
    /// Lifetime bandwidth of this stream
    pub mb_per_sec: f64,
}

/// Complete metrics state as of one tick.
///
/// Built by the aggregator in one go and published whole; readers never see
/// a partially updated snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    pub elapsed_secs: f64,
    pub total_events: u64,
    pub total_bytes: u64,
    /// Events/sec averaged over the rolling window
    pub rolling_eps: f64,
    pub rolling_bps: f64,
    /// Events/sec averaged over the global window
    pub global_eps: f64,
    pub global_bps: f64,
    /// Events/sec since start
    pub lifetime_eps: f64,
    pub rolling_samples: usize,
    pub global_samples: usize,
    /// Sorted by event count, highest first
    pub streams: Vec<StreamSnapshot>,
}

impl MetricsSnapshot {
    pub fn rolling_mb_per_sec(&self) -> f64 {
        self.rolling_bps / MIB
    }

    pub fn global_mb_per_sec(&self) -> f64 {
        self.global_bps / MIB
    }

    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / MIB
    }

    pub fn stream(&self, name: &str) -> Option<&StreamSnapshot> {
        self.streams.iter().find(|s| s.name == name)
    }
}

pub(crate) fn bytes_to_mb(bytes: f64) -> f64 {
    bytes / MIB
}
