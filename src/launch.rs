//! Multi-process launcher.
//!
//! `dataflux launch --workers N` starts N independent `dataflux run` child
//! processes from the same configuration, each with its own `--worker-id`.
//! Workers do not coordinate; this process only supervises their lifetime.

use crate::RunOpts;
use anyhow::Context;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long children get to drain after an interrupt before they are killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Arguments for worker `worker_id`'s `run` invocation.
pub fn worker_args(worker_id: usize, opts: &RunOpts) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--worker-id".to_string(),
        worker_id.to_string(),
    ];
    args.extend(opts.to_args());
    args
}

/// Spawn `workers` children of `program` and wait for all of them.
///
/// Cancelling `cancel` gives every child [`SHUTDOWN_GRACE`] to exit on its
/// own before it is killed. Fails if any child exits unsuccessfully.
pub async fn launch_workers(
    program: &Path,
    workers: usize,
    opts: &RunOpts,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    if workers == 0 {
        anyhow::bail!("--workers must be at least 1");
    }

    let mut tasks = JoinSet::new();
    for worker_id in 0..workers {
        let child = Command::new(program)
            .args(worker_args(worker_id, opts))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start worker {worker_id}"))?;
        info!(worker_id, pid = ?child.id(), "Started worker");
        tasks.spawn(supervise(worker_id, child, cancel.clone()));
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (worker_id, status) = joined.context("Worker supervisor task failed")?;
        match status {
            Ok(status) if status.success() => info!(worker_id, "Worker exited"),
            Ok(status) => {
                failed += 1;
                error!(worker_id, %status, "Worker exited unsuccessfully");
            }
            Err(e) => {
                failed += 1;
                error!(worker_id, error = %e, "Failed to wait for worker");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {workers} workers failed");
    }
    Ok(())
}

async fn supervise(
    worker_id: usize,
    mut child: Child,
    cancel: CancellationToken,
) -> (usize, std::io::Result<ExitStatus>) {
    tokio::select! {
        status = child.wait() => (worker_id, status),
        _ = cancel.cancelled() => {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(status) => (worker_id, status),
                Err(_) => {
                    warn!(worker_id, "Worker did not stop in time, killing it");
                    if let Err(e) = child.kill().await {
                        return (worker_id, Err(e));
                    }
                    (worker_id, child.wait().await)
                }
            }
        }
    }
}
