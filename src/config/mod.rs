//! Configuration loading and CLI overrides.

pub mod duration;

pub use duration::parse_duration;

use crate::RunOpts;
use anyhow::Context;
use flux_core::{ExporterConfig, FluxConfig, SinkKind};
use std::path::Path;

/// Load `path`, apply the CLI overrides for `worker_id`, and validate.
pub fn load_config(path: &Path, opts: &RunOpts, worker_id: usize) -> anyhow::Result<FluxConfig> {
    let mut config = FluxConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    apply_overrides(&mut config, opts, worker_id)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Apply command-line overrides on top of a loaded configuration.
///
/// Workers other than worker 0 get a distinct seed and, when an exporter is
/// configured, a listen port offset by their id so that every process
/// launched from the same file can bind.
pub fn apply_overrides(
    config: &mut FluxConfig,
    opts: &RunOpts,
    worker_id: usize,
) -> anyhow::Result<()> {
    if let Some(sink) = opts.sink {
        let kind = SinkKind::from(sink);
        config
            .restrict_to_sink_kind(kind)
            .with_context(|| format!("Cannot restrict sinks to '{kind}'"))?;
    }
    if let Some(mode) = opts.mode {
        config.mode = mode.into();
    }
    if let Some(seed) = opts.seed {
        config.seed = Some(seed);
    }
    if let Some(listen) = &opts.metrics_listen {
        match config.metrics.exporter.as_mut() {
            Some(exporter) => exporter.listen = listen.clone(),
            None => config.metrics.exporter = Some(ExporterConfig::new(listen.clone())),
        }
    }

    if worker_id > 0 {
        config.seed = config.seed.map(|seed| worker_seed(seed, worker_id));
        if let Some(exporter) = config.metrics.exporter.as_mut() {
            exporter.listen = offset_port(&exporter.listen, worker_id)?;
        }
    }
    Ok(())
}

/// Seed for `worker_id` derived from the shared base seed.
pub fn worker_seed(seed: u64, worker_id: usize) -> u64 {
    seed ^ ((worker_id as u64) << 48)
}

/// Shift the port of a `host:port` address by `offset`.
pub fn offset_port(listen: &str, offset: usize) -> anyhow::Result<String> {
    let (host, port) = listen
        .rsplit_once(':')
        .with_context(|| format!("Listen address '{listen}' has no port"))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port in listen address '{listen}'"))?;
    let shifted = u16::try_from(offset)
        .ok()
        .and_then(|offset| port.checked_add(offset))
        .with_context(|| format!("Port {port} + {offset} is out of range"))?;
    Ok(format!("{host}:{shifted}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ModeArg, SinkArg};
    use flux_core::Mode;
    use std::path::PathBuf;

    const YAML: &str = r#"
regions: [{ name: us }, { name: eu }]
emitters: 10
streams:
  video_logs: { weight: 1.0 }
sinks:
  mock: { type: mock }
  api: { type: http, endpoint: "http://localhost:8000/ingest" }
region_sinks:
  default: [mock, api]
seed: 42
metrics:
  exporter:
    listen: "127.0.0.1:9100"
"#;

    fn opts() -> RunOpts {
        RunOpts {
            config: PathBuf::from("dataflux.yaml"),
            sink: None,
            mode: None,
            duration: None,
            metrics_listen: None,
            seed: None,
            quiet: false,
        }
    }

    #[test]
    fn test_sink_override_restricts_routes() {
        let mut config = FluxConfig::from_yaml(YAML).unwrap();
        let opts = RunOpts {
            sink: Some(SinkArg::Http),
            ..opts()
        };
        apply_overrides(&mut config, &opts, 0).unwrap();

        assert_eq!(config.sinks.len(), 1);
        assert!(config.sinks.contains_key("api"));
        assert_eq!(config.region_sinks["default"], vec!["api".to_string()]);
    }

    #[test]
    fn test_mode_and_seed_override() {
        let mut config = FluxConfig::from_yaml(YAML).unwrap();
        let opts = RunOpts {
            mode: Some(ModeArg::Safe),
            seed: Some(7),
            ..opts()
        };
        apply_overrides(&mut config, &opts, 0).unwrap();

        assert_eq!(config.mode, Mode::Safe);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_worker_offsets_seed_and_port() {
        let mut config = FluxConfig::from_yaml(YAML).unwrap();
        apply_overrides(&mut config, &opts(), 3).unwrap();

        assert_eq!(config.seed, Some(worker_seed(42, 3)));
        assert_ne!(config.seed, Some(42));
        assert_eq!(
            config.metrics.exporter.as_ref().unwrap().listen,
            "127.0.0.1:9103"
        );
    }

    #[test]
    fn test_metrics_listen_adds_exporter() {
        let mut config = FluxConfig::from_yaml(
            "regions: [{ name: us }]\nemitters: 1\nstreams:\n  video_logs: { weight: 1.0 }\n",
        ).unwrap();
        let opts = RunOpts {
            metrics_listen: Some("0.0.0.0:9200".to_string()),
            ..opts()
        };
        apply_overrides(&mut config, &opts, 0).unwrap();

        assert_eq!(
            config.metrics.exporter.as_ref().unwrap().listen,
            "0.0.0.0:9200"
        );
    }

    #[test]
    fn test_offset_port() {
        assert_eq!(offset_port("localhost:9100", 0).unwrap(), "localhost:9100");
        assert_eq!(offset_port("[::1]:9100", 2).unwrap(), "[::1]:9102");
        assert!(offset_port("localhost", 1).is_err());
        assert!(offset_port("localhost:65535", 1).is_err());
    }
}
