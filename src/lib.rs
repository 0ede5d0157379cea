//! DataFlux Library
//!
//! A synthetic telemetry load generator for exercising streaming and
//! ingestion pipelines.
//!
//! Each worker process simulates a pool of users spread over regions. Users
//! emit events from weighted streams, events are buffered per region, and
//! sealed batches are fanned out to the sinks routed for that region.
//!
//! # CLI Usage
//!
//! ```bash
//! # Run a single worker
//! dataflux run --config dataflux.yaml
//!
//! # Run for five minutes against the configured HTTP sink only
//! dataflux run --config dataflux.yaml --sink http --duration 5m
//!
//! # Start four independent workers
//! dataflux launch --workers 4 --config dataflux.yaml
//!
//! # Check a configuration file without generating load
//! dataflux validate --config dataflux.yaml
//! ```

use clap::{Parser, ValueEnum};
use flux_core::{Mode, SinkKind};
use std::path::PathBuf;

pub mod config;
pub mod launch;
pub mod report;
pub mod shutdown;

/// Sink type accepted by `--sink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkArg {
    Mock,
    #[value(alias = "fastapi")]
    Http,
    #[value(alias = "kafka")]
    Queue,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Mock => SinkKind::Mock,
            SinkArg::Http => SinkKind::Http,
            SinkArg::Queue => SinkKind::Queue,
        }
    }
}

/// Emission mode accepted by `--mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Normal,
    Safe,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Normal => Mode::Normal,
            ModeArg::Safe => Mode::Safe,
        }
    }
}

/// Options shared by `run` and `launch`.
#[derive(Parser, Debug, Clone)]
pub struct RunOpts {
    /// Path to the YAML configuration file
    #[arg(long, short = 'c', default_value = "dataflux.yaml", env = "DATAFLUX_CONFIG")]
    pub config: PathBuf,

    /// Keep only sinks of this type and route every region to them
    #[arg(long, value_enum)]
    pub sink: Option<SinkArg>,

    /// Override the emission mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Stop after this long (e.g. "30s", "5m", "1h", or plain seconds)
    #[arg(long)]
    pub duration: Option<String>,

    /// Serve Prometheus metrics on this address (e.g. "0.0.0.0:9100")
    #[arg(long, env = "DATAFLUX_METRICS_LISTEN")]
    pub metrics_listen: Option<String>,

    /// Override the configured seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Suppress the console report
    #[arg(long)]
    pub quiet: bool,
}

impl RunOpts {
    /// Render these options back into `run` arguments for a child process.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--config".to_string(),
            self.config.display().to_string(),
        ];
        if let Some(sink) = self.sink {
            args.push("--sink".to_string());
            args.push(SinkKind::from(sink).to_string());
        }
        if let Some(mode) = self.mode {
            args.push("--mode".to_string());
            args.push(Mode::from(mode).to_string());
        }
        if let Some(duration) = &self.duration {
            args.push("--duration".to_string());
            args.push(duration.clone());
        }
        if let Some(listen) = &self.metrics_listen {
            args.push("--metrics-listen".to_string());
            args.push(listen.clone());
        }
        if let Some(seed) = self.seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        if self.quiet {
            args.push("--quiet".to_string());
        }
        args
    }
}
