//! Tick-driven throughput aggregation.

use crate::counters::EventCounters;
use crate::snapshot::{bytes_to_mb, MetricsSnapshot, StreamSnapshot};
use crate::window::RollingWindow;
use flux_core::{Batch, MetricsConfig};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct TickState {
    rolling_events: RollingWindow,
    rolling_bytes: RollingWindow,
    global_events: RollingWindow,
    global_bytes: RollingWindow,
    last_events: u64,
    last_bytes: u64,
    ticks: u64,
}

/// Owns the event counters and turns them into snapshots once per tick.
///
/// Any number of flushers may record batches concurrently; [`tick`] is the
/// single writer of snapshots, which are published through a watch channel.
///
/// [`tick`]: MetricsAggregator::tick
pub struct MetricsAggregator {
    counters: EventCounters,
    state: Mutex<TickState>,
    tick_interval: Duration,
    started: Instant,
    snapshots: watch::Sender<Arc<MetricsSnapshot>>,
}

impl MetricsAggregator {
    pub fn new(config: &MetricsConfig) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(MetricsSnapshot::default()));
        Self {
            counters: EventCounters::new(),
            state: Mutex::new(TickState {
                rolling_events: RollingWindow::new(config.rolling_window),
                rolling_bytes: RollingWindow::new(config.rolling_window),
                global_events: RollingWindow::new(config.global_window),
                global_bytes: RollingWindow::new(config.global_window),
                last_events: 0,
                last_bytes: 0,
                ticks: 0,
            }),
            tick_interval: config.tick_interval(),
            started: Instant::now(),
            snapshots,
        }
    }

    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    /// Count a flushed batch. Called exactly once per batch.
    pub fn record_batch(&self, batch: &Batch) {
        self.counters.record_batch(batch);
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MetricsSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> Arc<MetricsSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Sample the counters, advance both windows and publish a snapshot.
    pub fn tick(&self) -> Arc<MetricsSnapshot> {
        let elapsed = self.started.elapsed().as_secs_f64();
        let (streams, totals) = self.counters.streams();

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let delta_events = totals.events - state.last_events;
        let delta_bytes = totals.bytes - state.last_bytes;
        state.last_events = totals.events;
        state.last_bytes = totals.bytes;
        state.ticks += 1;

        state.rolling_events.push(delta_events);
        state.rolling_bytes.push(delta_bytes);
        state.global_events.push(delta_events);
        state.global_bytes.push(delta_bytes);

        let per_sec = |window: &RollingWindow| window.average() / self.tick_secs();

        let mut stream_rows: Vec<StreamSnapshot> = streams
            .into_iter()
            .map(|(name, s)| StreamSnapshot {
                name,
                events: s.events,
                bytes: s.bytes,
                percent: if totals.events > 0 {
                    s.events as f64 / totals.events as f64 * 100.0
                } else {
                    0.0
                },
                mb_per_sec: if elapsed > 0.0 {
                    bytes_to_mb(s.bytes as f64 / elapsed)
                } else {
                    0.0
                },
            })
            .collect();
        stream_rows.sort_by(|a, b| b.events.cmp(&a.events).then_with(|| a.name.cmp(&b.name)));

        let snapshot = Arc::new(MetricsSnapshot {
            tick: state.ticks,
            elapsed_secs: elapsed,
            total_events: totals.events,
            total_bytes: totals.bytes,
            rolling_eps: per_sec(&state.rolling_events),
            rolling_bps: per_sec(&state.rolling_bytes),
            global_eps: per_sec(&state.global_events),
            global_bps: per_sec(&state.global_bytes),
            lifetime_eps: if elapsed > 0.0 {
                totals.events as f64 / elapsed
            } else {
                0.0
            },
            rolling_samples: state.rolling_events.len(),
            global_samples: state.global_events.len(),
            streams: stream_rows,
        });
        drop(state);

        self.snapshots.send_replace(snapshot.clone());
        debug!(
            tick = snapshot.tick,
            total_events = snapshot.total_events,
            rolling_eps = snapshot.rolling_eps,
            "Metrics tick"
        );
        snapshot
    }

    /// Tick on the configured interval until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }

    fn tick_secs(&self) -> f64 {
        let secs = self.tick_interval.as_secs_f64();
        if secs > 0.0 {
            secs
        } else {
            1.0
        }
    }
}
