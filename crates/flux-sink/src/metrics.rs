//! Per-sink delivery metrics.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Latency samples kept per sink; older samples only count towards the mean.
pub const MAX_LATENCY_SAMPLES: usize = 256;

/// Read-only view of a sink's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SinkMetrics {
    /// Events delivered
    pub success_count: u64,
    /// Events that could not be delivered
    pub fail_count: u64,
    /// Delivery attempts recorded (one per flushed batch)
    pub flushes: u64,
    /// Most recent per-flush latencies, oldest first
    pub latency_samples_ms: Vec<f64>,
    /// Mean latency over every recorded flush
    pub mean_latency_ms: f64,
}

/// Counters owned by a sink and updated as it delivers.
///
/// Counts are atomics; the latency ring is behind a short-lived lock.
#[derive(Debug, Default)]
pub struct SinkMetricsRecorder {
    success: AtomicU64,
    fail: AtomicU64,
    flushes: AtomicU64,
    latency_total_us: AtomicU64,
    samples: Mutex<VecDeque<Duration>>,
}

impl SinkMetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delivery attempt covering `succeeded + failed` events.
    pub fn record(&self, succeeded: usize, failed: usize, latency: Duration) {
        self.success.fetch_add(succeeded as u64, Ordering::Relaxed);
        self.fail.fetch_add(failed as u64, Ordering::Relaxed);
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.latency_total_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);

        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        if samples.len() == MAX_LATENCY_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(latency);
    }

    pub fn record_success(&self, events: usize, latency: Duration) {
        self.record(events, 0, latency);
    }

    pub fn record_failure(&self, events: usize, latency: Duration) {
        self.record(0, events, latency);
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn fail_count(&self) -> u64 {
        self.fail.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SinkMetrics {
        let flushes = self.flushes.load(Ordering::Relaxed);
        let total_us = self.latency_total_us.load(Ordering::Relaxed);
        let latency_samples_ms = self
            .samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|d| d.as_micros() as f64 / 1000.0)
            .collect();

        SinkMetrics {
            success_count: self.success_count(),
            fail_count: self.fail_count(),
            flushes,
            latency_samples_ms,
            mean_latency_ms: if flushes > 0 {
                total_us as f64 / flushes as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let recorder = SinkMetricsRecorder::new();
        assert_eq!(recorder.snapshot(), SinkMetrics::default());
    }

    #[test]
    fn test_counts_and_mean() {
        let recorder = SinkMetricsRecorder::new();
        recorder.record_success(10, Duration::from_millis(4));
        recorder.record_failure(3, Duration::from_millis(8));
        recorder.record(5, 2, Duration::from_millis(6));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.success_count, 15);
        assert_eq!(snapshot.fail_count, 5);
        assert_eq!(snapshot.flushes, 3);
        assert_eq!(snapshot.latency_samples_ms, vec![4.0, 8.0, 6.0]);
        assert!((snapshot.mean_latency_ms - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_samples_are_bounded() {
        let recorder = SinkMetricsRecorder::new();
        for i in 0..(MAX_LATENCY_SAMPLES + 10) {
            recorder.record_success(1, Duration::from_millis(i as u64));
        }
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.latency_samples_ms.len(), MAX_LATENCY_SAMPLES);
        assert_eq!(snapshot.latency_samples_ms[0], 10.0);
        assert_eq!(snapshot.flushes, (MAX_LATENCY_SAMPLES + 10) as u64);
    }
}
