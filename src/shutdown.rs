//! Stop triggers for a run: interrupt or elapsed `--duration`.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    DurationElapsed,
}

/// Wait until `interrupt` resolves or `duration` elapses.
///
/// An interrupt listener that fails is logged and ignored, so a bounded run
/// still stops when its duration is up.
pub async fn wait_for_stop<F>(interrupt: F, duration: Option<Duration>) -> StopReason
where
    F: Future<Output = std::io::Result<()>>,
{
    let elapsed = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(elapsed);

    let interrupted = tokio::select! {
        result = interrupt => Some(result),
        _ = &mut elapsed => None,
    };
    match interrupted {
        Some(Ok(())) => StopReason::Interrupted,
        Some(Err(e)) => {
            warn!("Failed to listen for Ctrl+C: {e}");
            elapsed.await;
            StopReason::DurationElapsed
        }
        None => StopReason::DurationElapsed,
    }
}

/// Cancel `cancel` on Ctrl+C, or once `duration` elapses when given.
pub fn spawn_interrupt(cancel: CancellationToken, duration: Option<Duration>) {
    tokio::spawn(async move {
        match wait_for_stop(tokio::signal::ctrl_c(), duration).await {
            StopReason::Interrupted => info!("Interrupt received, draining"),
            StopReason::DurationElapsed => info!("Run duration elapsed, draining"),
        }
        cancel.cancel();
    });
}
