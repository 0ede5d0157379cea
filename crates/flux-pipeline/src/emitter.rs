//! One emission loop per simulated user.

use crate::buffer::RegionBuffers;
use crate::error::PipelineError;
use crate::limiter::RateLimiter;
use flux_core::{secs_to_duration, FluxConfig, User};
use flux_generator::{derive_seed, pick_device, EventFactory, StreamSelector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct StreamTiming {
    interval_sec: f64,
    jitter_sec: f64,
}

/// Everything an emission loop shares with its siblings.
pub struct EmitterContext {
    factory: Arc<dyn EventFactory>,
    selector: StreamSelector,
    timings: HashMap<String, StreamTiming>,
    buffers: Arc<RegionBuffers>,
    limiter: Arc<RateLimiter>,
    min_sleep: Duration,
}

impl EmitterContext {
    pub fn new(
        config: &FluxConfig,
        factory: Arc<dyn EventFactory>,
        buffers: Arc<RegionBuffers>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, PipelineError> {
        let selector = StreamSelector::new(&config.streams)?;
        let timings = config
            .streams
            .iter()
            .map(|(name, stream)| {
                (
                    name.clone(),
                    StreamTiming {
                        interval_sec: stream.interval_sec,
                        jitter_sec: config.jitter_for(name),
                    },
                )
            })
            .collect();
        Ok(Self {
            factory,
            selector,
            timings,
            buffers,
            limiter,
            min_sleep: config.mode.min_sleep(),
        })
    }

    /// `max(interval ± U(jitter), 0)`, raised to the mode's minimum sleep.
    pub fn sleep_for<R: Rng>(&self, stream: &str, rng: &mut R) -> Duration {
        let Some(timing) = self.timings.get(stream) else {
            return self.min_sleep;
        };
        let offset = if timing.jitter_sec > 0.0 {
            rng.random_range(-timing.jitter_sec..=timing.jitter_sec)
        } else {
            0.0
        };
        let secs = (timing.interval_sec + offset).max(0.0);
        secs_to_duration(secs).max(self.min_sleep)
    }
}

/// Runs and stops the per-user emission tasks.
pub struct EmitterSupervisor {
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

impl EmitterSupervisor {
    /// Spawn one task per user.
    ///
    /// With a seed, user `i` draws from `StdRng` seeded with
    /// `derive_seed(seed, i + 1)`; otherwise from OS entropy.
    pub fn spawn(
        users: Vec<User>,
        context: Arc<EmitterContext>,
        seed: Option<u64>,
        cancel: CancellationToken,
    ) -> Self {
        let mut tasks = JoinSet::new();
        for (index, user) in users.into_iter().enumerate() {
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(derive_seed(seed, index as u64 + 1)),
                None => StdRng::from_os_rng(),
            };
            tasks.spawn(emit_loop(user, context.clone(), rng, cancel.clone()));
        }
        Self { tasks, cancel }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every loop and wait for all of them to return.
    ///
    /// A loop that is mid-append finishes that append first.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Emitter task failed");
            }
        }
    }
}

async fn emit_loop(
    user: User,
    context: Arc<EmitterContext>,
    mut rng: StdRng,
    cancel: CancellationToken,
) {
    loop {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = context.limiter.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let stream = context.selector.pick(&mut rng);
        let created = pick_device(&user, &mut rng)
            .and_then(|device| context.factory.create(stream, &user, device, &mut rng));
        match created {
            Ok(event) => match context.buffers.append(event, &user.region).await {
                Ok(()) => {}
                Err(PipelineError::Closed(_)) => break,
                Err(e) => warn!(user = %user.user_id, error = %e, "Failed to buffer event"),
            },
            Err(e) => warn!(user = %user.user_id, stream, error = %e, "Failed to create event"),
        }

        let sleep = context.sleep_for(stream, &mut rng);
        drop(permit);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(sleep) => {}
        }
    }
    debug!(user = %user.user_id, "Emitter stopped");
}
