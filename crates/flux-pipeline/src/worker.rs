//! Worker lifecycle: INIT → RUNNING → DRAINING → STOPPED.

use crate::buffer::RegionBuffers;
use crate::emitter::{EmitterContext, EmitterSupervisor};
use crate::error::PipelineError;
use crate::limiter::RateLimiter;
use crate::registry::SinkRegistry;
use flux_core::FluxConfig;
use flux_generator::{derive_seed, generate_user_pool, EventFactory};
use flux_metrics::{MetricsAggregator, MetricsSnapshot};
use flux_sink::SinkMetrics;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shortest pause between stale-buffer checks.
const MIN_SEALER_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkerState {
    Init,
    Running,
    Draining,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Init => write!(f, "INIT"),
            WorkerState::Running => write!(f, "RUNNING"),
            WorkerState::Draining => write!(f, "DRAINING"),
            WorkerState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Final counters of a completed run.
#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub snapshot: Arc<MetricsSnapshot>,
    pub sinks: BTreeMap<String, SinkMetrics>,
}

/// One load-generating process worth of users, buffers and sinks.
pub struct Worker {
    config: FluxConfig,
    factory: Arc<dyn EventFactory>,
    aggregator: Arc<MetricsAggregator>,
    registry: Arc<SinkRegistry>,
    state: watch::Sender<WorkerState>,
}

impl Worker {
    /// Validate the configuration and initialize every configured sink.
    pub async fn new(
        config: FluxConfig,
        factory: Arc<dyn EventFactory>,
    ) -> Result<Self, PipelineError> {
        Self::check(&config, factory.as_ref())?;
        let aggregator = Arc::new(MetricsAggregator::new(&config.metrics));
        let registry = Arc::new(SinkRegistry::from_config(&config, aggregator.clone()).await);
        Self::with_registry(config, factory, registry, aggregator)
    }

    /// Build a worker around an existing registry.
    ///
    /// `registry` must record into `aggregator`.
    pub fn with_registry(
        config: FluxConfig,
        factory: Arc<dyn EventFactory>,
        registry: Arc<SinkRegistry>,
        aggregator: Arc<MetricsAggregator>,
    ) -> Result<Self, PipelineError> {
        Self::check(&config, factory.as_ref())?;
        let (state, _) = watch::channel(WorkerState::Init);
        Ok(Self {
            config,
            factory,
            aggregator,
            registry,
            state,
        })
    }

    fn check(config: &FluxConfig, factory: &dyn EventFactory) -> Result<(), PipelineError> {
        config.validate()?;
        factory.check_streams(&mut config.streams.keys().map(String::as_str))?;
        Ok(())
    }

    pub fn config(&self) -> &FluxConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn aggregator(&self) -> &Arc<MetricsAggregator> {
        &self.aggregator
    }

    pub fn registry(&self) -> &Arc<SinkRegistry> {
        &self.registry
    }

    /// Run until `cancel` fires, then drain and stop.
    ///
    /// Draining stops new emissions, seals and flushes every buffered event,
    /// then closes every sink. A worker runs at most once.
    pub async fn run(&self, cancel: CancellationToken) -> Result<WorkerSummary, PipelineError> {
        if self.state() != WorkerState::Init {
            return Err(PipelineError::AlreadyStarted);
        }

        let regions = self.config.region_names();
        let users = {
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(derive_seed(seed, 0)),
                None => StdRng::from_os_rng(),
            };
            generate_user_pool(self.config.emitters.num_users(), &regions, &mut rng)?
        };

        let (buffers, flushers) = RegionBuffers::spawn(
            &regions,
            self.config.flush_batch_size,
            self.config.flush_queue_depth,
            self.registry.clone(),
        );
        let limiter = Arc::new(RateLimiter::new(self.config.concurrency_limit()));
        let context = Arc::new(EmitterContext::new(
            &self.config,
            self.factory.clone(),
            buffers.clone(),
            limiter.clone(),
        )?);

        let metrics_cancel = CancellationToken::new();
        let metrics_task = tokio::spawn({
            let aggregator = self.aggregator.clone();
            let cancel = metrics_cancel.clone();
            async move { aggregator.run(cancel).await }
        });

        let sealer_cancel = CancellationToken::new();
        let sealer_task = self.config.flush_interval().map(|interval| {
            tokio::spawn(run_sealer(buffers.clone(), interval, sealer_cancel.clone()))
        });

        let user_count = users.len();
        let emitters = EmitterSupervisor::spawn(
            users,
            context,
            self.config.seed,
            CancellationToken::new(),
        );

        self.state.send_replace(WorkerState::Running);
        info!(
            users = user_count,
            regions = regions.len(),
            sinks = self.registry.len(),
            concurrency = limiter.capacity(),
            mode = %self.config.mode,
            "Worker running"
        );

        cancel.cancelled().await;

        self.state.send_replace(WorkerState::Draining);
        info!("Worker draining");

        emitters.shutdown().await;
        sealer_cancel.cancel();
        if let Some(task) = sealer_task {
            if let Err(e) = task.await {
                error!(error = %e, "Sealer task failed");
            }
        }
        let sealed = buffers.seal_all().await;
        buffers.close().await;
        flushers.join().await;
        info!(partial_batches = sealed, "Buffers drained");

        metrics_cancel.cancel();
        if let Err(e) = metrics_task.await {
            error!(error = %e, "Metrics task failed");
        }
        let snapshot = self.aggregator.tick();

        self.registry.close_all().await;
        self.state.send_replace(WorkerState::Stopped);
        info!(total_events = snapshot.total_events, "Worker stopped");

        Ok(WorkerSummary {
            snapshot,
            sinks: self.registry.all_metrics(),
        })
    }
}

async fn run_sealer(buffers: Arc<RegionBuffers>, max_age: Duration, cancel: CancellationToken) {
    let period = (max_age / 4).max(MIN_SEALER_PERIOD);
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                buffers.seal_stale(max_age).await;
            }
        }
    }
}
