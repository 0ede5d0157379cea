//! Per-region event buffers and the seal/flush protocol.
//!
//! Each region owns a buffer behind its own lock and a bounded channel that
//! feeds a single flusher task:
//!
//! ```text
//!   append ──▶ [ buffer ] ──seal──▶ channel ──▶ flusher ──▶ SinkRegistry::flush
//! ```
//!
//! Sealing swaps the buffer for an empty one and enqueues the batch while the
//! lock is held, so batches reach the channel in seal order and one flusher
//! per region delivers them one at a time. Appenders never wait for delivery,
//! only for channel space when the flusher falls behind.

use crate::error::PipelineError;
use crate::registry::SinkRegistry;
use flux_core::{Batch, Event};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

struct RegionState {
    events: Vec<Event>,
    next_sequence: u64,
    last_seal: Instant,
    /// `None` once the buffers are closed
    sender: Option<mpsc::Sender<Arc<Batch>>>,
}

pub struct RegionBuffers {
    regions: HashMap<String, Mutex<RegionState>>,
    batch_size: usize,
}

/// Receiving end of one region's sealed batches.
pub type BatchReceiver = mpsc::Receiver<Arc<Batch>>;

impl RegionBuffers {
    /// Create buffers for `regions`, returning each region's batch receiver.
    pub fn new(
        regions: &[String],
        batch_size: usize,
        queue_depth: usize,
    ) -> (Self, Vec<(String, BatchReceiver)>) {
        let now = Instant::now();
        let mut states = HashMap::with_capacity(regions.len());
        let mut receivers = Vec::with_capacity(regions.len());
        for region in regions {
            let (tx, rx) = mpsc::channel(queue_depth.max(1));
            states.insert(
                region.clone(),
                Mutex::new(RegionState {
                    events: Vec::with_capacity(batch_size),
                    next_sequence: 0,
                    last_seal: now,
                    sender: Some(tx),
                }),
            );
            receivers.push((region.clone(), rx));
        }
        let buffers = Self {
            regions: states,
            batch_size: batch_size.max(1),
        };
        (buffers, receivers)
    }

    /// Create buffers and spawn one flusher per region delivering to `registry`.
    pub fn spawn(
        regions: &[String],
        batch_size: usize,
        queue_depth: usize,
        registry: Arc<SinkRegistry>,
    ) -> (Arc<Self>, Flushers) {
        let (buffers, receivers) = Self::new(regions, batch_size, queue_depth);
        let handles = receivers
            .into_iter()
            .map(|(region, rx)| {
                let handle = tokio::spawn(run_flusher(region.clone(), rx, registry.clone()));
                (region, handle)
            })
            .collect();
        (Arc::new(buffers), Flushers { handles })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Append an event; seal the buffer when it reaches the batch size.
    pub async fn append(&self, event: Event, region: &str) -> Result<(), PipelineError> {
        let slot = self.slot(region)?;
        let mut state = slot.lock().await;
        if state.sender.is_none() {
            return Err(PipelineError::Closed(region.to_string()));
        }
        state.events.push(event);
        if state.events.len() >= self.batch_size {
            seal_locked(region, &mut state, self.batch_size).await?;
        }
        Ok(())
    }

    /// Seal the region's buffer if it holds any events.
    ///
    /// Returns whether a batch was sealed.
    pub async fn seal(&self, region: &str) -> Result<bool, PipelineError> {
        let slot = self.slot(region)?;
        let mut state = slot.lock().await;
        if state.events.is_empty() || state.sender.is_none() {
            return Ok(false);
        }
        seal_locked(region, &mut state, self.batch_size).await?;
        Ok(true)
    }

    /// Seal every non-empty buffer whose last seal is at least `max_age` old.
    pub async fn seal_stale(&self, max_age: Duration) -> usize {
        let mut sealed = 0;
        for (region, slot) in &self.regions {
            let mut state = slot.lock().await;
            if state.events.is_empty() || state.sender.is_none() {
                continue;
            }
            if state.last_seal.elapsed() < max_age {
                continue;
            }
            match seal_locked(region, &mut state, self.batch_size).await {
                Ok(()) => sealed += 1,
                Err(e) => warn!(region = %region, error = %e, "Failed to seal stale buffer"),
            }
        }
        sealed
    }

    /// Seal every non-empty buffer.
    pub async fn seal_all(&self) -> usize {
        let mut sealed = 0;
        for region in self.regions.keys() {
            match self.seal(region).await {
                Ok(true) => sealed += 1,
                Ok(false) => {}
                Err(e) => warn!(region = %region, error = %e, "Failed to seal buffer"),
            }
        }
        sealed
    }

    /// Stop accepting events and let the flushers finish.
    ///
    /// Events still buffered are not sealed; call [`seal_all`] first.
    ///
    /// [`seal_all`]: RegionBuffers::seal_all
    pub async fn close(&self) {
        for slot in self.regions.values() {
            slot.lock().await.sender = None;
        }
    }

    /// Events currently buffered for `region`.
    pub async fn len(&self, region: &str) -> Result<usize, PipelineError> {
        Ok(self.slot(region)?.lock().await.events.len())
    }

    /// Batches sealed so far for `region`.
    pub async fn sealed_count(&self, region: &str) -> Result<u64, PipelineError> {
        Ok(self.slot(region)?.lock().await.next_sequence)
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    fn slot(&self, region: &str) -> Result<&Mutex<RegionState>, PipelineError> {
        self.regions
            .get(region)
            .ok_or_else(|| PipelineError::UnknownRegion(region.to_string()))
    }
}

/// Swap the buffer for an empty one and enqueue the sealed batch.
///
/// Must be called with the region lock held.
async fn seal_locked(
    region: &str,
    state: &mut RegionState,
    batch_size: usize,
) -> Result<(), PipelineError> {
    let events = std::mem::replace(&mut state.events, Vec::with_capacity(batch_size));
    let batch = Arc::new(Batch::new(region, state.next_sequence, events));
    state.next_sequence += 1;
    state.last_seal = Instant::now();

    let sender = state
        .sender
        .as_ref()
        .ok_or_else(|| PipelineError::Closed(region.to_string()))?;
    debug!(region, sequence = batch.sequence, events = batch.len(), "Sealed batch");
    if sender.send(batch.clone()).await.is_err() {
        error!(region, events = batch.len(), "Flusher is gone, dropping sealed batch");
        return Err(PipelineError::Closed(region.to_string()));
    }
    Ok(())
}

async fn run_flusher(region: String, mut rx: BatchReceiver, registry: Arc<SinkRegistry>) {
    while let Some(batch) = rx.recv().await {
        registry.flush(&batch).await;
    }
    debug!(region = %region, "Flusher drained");
}

/// Handles of the per-region flusher tasks.
pub struct Flushers {
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Flushers {
    /// Wait until every flusher has delivered its queued batches.
    ///
    /// Only returns after [`RegionBuffers::close`] dropped the senders.
    pub async fn join(self) {
        for (region, handle) in self.handles {
            if let Err(e) = handle.await {
                error!(region = %region, error = %e, "Flusher task failed");
            }
        }
    }
}
