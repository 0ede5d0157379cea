//! DataFlux - synthetic telemetry load generator
//!
//! Simulates a population of users emitting weighted event streams and
//! delivers them in per-region batches to mock, HTTP and message-queue sinks.
//!
//! # Usage Examples
//!
//! ## Single worker
//! ```bash
//! dataflux run --config dataflux.yaml --duration 5m
//! ```
//!
//! ## Several independent workers
//! ```bash
//! dataflux launch --workers 4 --config dataflux.yaml --metrics-listen 0.0.0.0:9100
//! ```
//!
//! ## Config check
//! ```bash
//! dataflux validate --config dataflux.yaml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use dataflux::config::{load_config, parse_duration};
use dataflux::report::format_report;
use dataflux::shutdown::spawn_interrupt;
use dataflux::RunOpts;
use flux_generator::{DefaultEventFactory, EventFactory};
use flux_metrics::{MetricsAggregator, PrometheusExporter};
use flux_pipeline::{SinkRegistry, Worker};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dataflux")]
#[command(about = "A synthetic telemetry load generator")]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one worker process until interrupted or --duration elapses
    Run {
        #[command(flatten)]
        opts: RunOpts,

        /// Index of this worker among independently launched workers
        #[arg(long, default_value = "0", env = "DATAFLUX_WORKER_ID")]
        worker_id: usize,
    },

    /// Start several independent worker processes
    Launch {
        /// Number of worker processes
        #[arg(long, default_value = "1")]
        workers: usize,

        #[command(flatten)]
        opts: RunOpts,
    },

    /// Load and validate a configuration file, then exit
    Validate {
        /// Path to the YAML configuration file
        #[arg(long, short = 'c', default_value = "dataflux.yaml", env = "DATAFLUX_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { opts, worker_id } => run_worker(opts, worker_id).await,
        Commands::Launch { workers, opts } => {
            let program =
                std::env::current_exe().context("Failed to locate the dataflux executable")?;
            let cancel = CancellationToken::new();
            spawn_interrupt(cancel.clone(), None);
            info!("Launching {workers} workers from {}", opts.config.display());
            dataflux::launch::launch_workers(&program, workers, &opts, cancel).await
        }
        Commands::Validate { config } => {
            let cfg = flux_core::FluxConfig::from_file(&config)
                .with_context(|| format!("Failed to load configuration from {}", config.display()))?;
            cfg.validate()
                .with_context(|| format!("Invalid configuration in {}", config.display()))?;
            let factory = DefaultEventFactory::new();
            factory
                .check_streams(&mut cfg.streams.keys().map(String::as_str))
                .context("Invalid stream table")?;
            println!(
                "Configuration OK: {} regions, {} users, {} streams, {} sinks",
                cfg.regions.len(),
                cfg.emitters.num_users(),
                cfg.streams.len(),
                cfg.sinks.len()
            );
            Ok(())
        }
    }
}

async fn run_worker(opts: RunOpts, worker_id: usize) -> anyhow::Result<()> {
    let config = load_config(&opts.config, &opts, worker_id)?;
    let duration = opts
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()
        .context("Invalid --duration")?;

    info!(
        worker_id,
        regions = config.regions.len(),
        users = config.emitters.num_users(),
        mode = %config.mode,
        "Starting worker"
    );

    let worker = Worker::new(config.clone(), Arc::new(DefaultEventFactory::new()))
        .await
        .context("Failed to start worker")?;

    let exporter_cancel = CancellationToken::new();
    let exporter_task = match &config.metrics.exporter {
        Some(exporter_config) => Some(spawn_exporter(
            worker.registry().clone(),
            worker.aggregator().clone(),
            exporter_config.clone(),
            exporter_cancel.clone(),
        )?),
        None => None,
    };

    let report_enabled = worker_id == 0 && !opts.quiet;
    let report_task = report_enabled.then(|| {
        spawn_report(
            worker.aggregator().clone(),
            worker.registry().clone(),
            config.metrics.report_every,
            exporter_cancel.clone(),
        )
    });

    let cancel = CancellationToken::new();
    spawn_interrupt(cancel.clone(), duration);

    let summary = worker.run(cancel).await.context("Worker failed")?;

    exporter_cancel.cancel();
    if let Some(task) = report_task {
        if let Err(e) = task.await {
            warn!("Report task failed: {e}");
        }
    }
    if let Some(task) = exporter_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Metrics exporter stopped with error: {e}"),
            Err(e) => warn!("Metrics exporter task failed: {e}"),
        }
    }

    if report_enabled {
        println!("{}", format_report(&summary.snapshot, &summary.sinks));
    }
    info!(
        worker_id,
        events = summary.snapshot.total_events,
        bytes = summary.snapshot.total_bytes,
        "Worker finished"
    );
    Ok(())
}

fn spawn_exporter(
    registry: Arc<SinkRegistry>,
    aggregator: Arc<MetricsAggregator>,
    config: flux_core::ExporterConfig,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<Result<(), flux_metrics::ExporterError>>> {
    let exporter = Arc::new(
        PrometheusExporter::new(registry, aggregator)
            .context("Failed to create metrics exporter")?,
    );
    Ok(tokio::spawn(async move {
        exporter.serve(&config, cancel).await
    }))
}

fn spawn_report(
    aggregator: Arc<MetricsAggregator>,
    registry: Arc<SinkRegistry>,
    report_every: u64,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let every = report_every.max(1);
    let mut snapshots = aggregator.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    if snapshot.tick > 0 && snapshot.tick % every == 0 {
                        println!("{}", format_report(&snapshot, &registry.all_metrics()));
                    }
                }
            }
        }
    })
}
