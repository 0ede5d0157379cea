//! Loading worker configuration from disk with CLI overrides applied.

use dataflux::config::load_config;
use dataflux::{ModeArg, RunOpts, SinkArg};
use flux_core::{Mode, SinkConfig};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
regions:
  - name: us
emitters:
  num_users: 4
  max_concurrency: 2
streams:
  video_logs: { weight: 0.5, interval_sec: 0.01 }
  device_telemetry: { weight: 0.5, interval_sec: 0.01 }
flush_batch_size: 5
flush_interval_sec: 0.05
seed: 11
sinks:
  mock: { type: mock }
  ingest: { type: http, endpoint: "http://127.0.0.1:1/ingest" }
region_sinks:
  default: [mock, ingest]
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn opts(path: PathBuf) -> RunOpts {
    RunOpts {
        config: path,
        sink: None,
        mode: None,
        duration: None,
        metrics_listen: None,
        seed: None,
        quiet: true,
    }
}

#[test]
fn test_load_config_applies_overrides() {
    let file = write_config(CONFIG);
    let opts = RunOpts {
        sink: Some(SinkArg::Mock),
        mode: Some(ModeArg::Safe),
        ..opts(file.path().to_path_buf())
    };

    let config = load_config(file.path(), &opts, 0).unwrap();

    assert_eq!(config.mode, Mode::Safe);
    assert_eq!(config.sinks.len(), 1);
    assert!(matches!(config.sinks["mock"], SinkConfig::Mock(_)));
    assert_eq!(config.concurrency_limit(), 2);
}

#[test]
fn test_load_config_rejects_invalid_file() {
    let file = write_config("regions: []\nemitters: 1\nstreams:\n  video_logs: { weight: 1.0 }\n");
    let err = load_config(file.path(), &opts(file.path().to_path_buf()), 0).unwrap_err();
    assert!(format!("{err:#}").contains("Invalid configuration"));
}

#[test]
fn test_load_config_missing_file() {
    let path = PathBuf::from("/nonexistent/dataflux.yaml");
    let err = load_config(&path, &opts(path.clone()), 0).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to load configuration"));
}

#[test]
fn test_loaded_config_drives_a_worker() {
    let file = write_config(CONFIG);
    let opts = RunOpts {
        sink: Some(SinkArg::Mock),
        ..opts(file.path().to_path_buf())
    };
    let config = load_config(file.path(), &opts, 0).unwrap();

    let summary = tokio_test::block_on(async {
        let worker = flux_pipeline::Worker::new(
            config,
            Arc::new(flux_generator::DefaultEventFactory::new()),
        )
        .await
        .unwrap();
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stopper.cancel();
        });
        worker.run(cancel).await.unwrap()
    });

    let mock = &summary.sinks["mock"];
    assert!(summary.snapshot.total_events > 0);
    assert_eq!(mock.success_count, summary.snapshot.total_events);
    assert_eq!(mock.fail_count, 0);
}
