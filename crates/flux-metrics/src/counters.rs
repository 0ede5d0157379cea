//! Monotonic event and byte counters.

use flux_core::Batch;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Count and byte total for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamTotals {
    pub events: u64,
    pub bytes: u64,
}

/// Global and per-stream counters.
///
/// Only ever increase. Totals are atomics so readers never take the lock.
#[derive(Debug, Default)]
pub struct EventCounters {
    events: AtomicU64,
    bytes: AtomicU64,
    streams: Mutex<BTreeMap<String, StreamTotals>>,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every event of a flushed batch once.
    pub fn record_batch(&self, batch: &Batch) {
        let mut batch_bytes = 0;
        {
            let mut streams = self.lock();
            for event in &batch.events {
                let bytes = event.encoded_len() as u64;
                batch_bytes += bytes;
                let totals = streams.entry(event.stream.clone()).or_default();
                totals.events += 1;
                totals.bytes += bytes;
            }
        }
        self.bytes.fetch_add(batch_bytes, Ordering::Relaxed);
        self.events
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
    }

    pub fn total_events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Per-stream totals together with matching global totals.
    ///
    /// Globals are derived from the same locked view so percentages always
    /// add up within one snapshot.
    pub fn streams(&self) -> (BTreeMap<String, StreamTotals>, StreamTotals) {
        let streams = self.lock().clone();
        let total = streams.values().fold(StreamTotals::default(), |acc, s| StreamTotals {
            events: acc.events + s.events,
            bytes: acc.bytes + s.bytes,
        });
        (streams, total)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StreamTotals>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
