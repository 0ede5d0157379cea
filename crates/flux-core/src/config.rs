//! Worker configuration.
//!
//! A worker is configured from a single YAML document:
//!
//! ```yaml
//! regions:
//!   - name: us-east
//!   - name: eu-west
//! emitters: 1000
//! max_concurrency: 200
//! streams:
//!   video_logs: { weight: 0.4, interval_sec: 0.5 }
//!   user_interactions: { weight: 0.6, interval_sec: 0.2, jitter_sec: 0.05 }
//! time_jitter_sec: 0.1
//! flush_batch_size: 100
//! flush_interval_sec: 2
//! mode: safe
//! sinks:
//!   mock: { type: mock }
//!   ingest: { type: http, endpoint: "http://localhost:8000/ingest" }
//! region_sinks:
//!   default: [mock]
//!   us-east: [mock, ingest]
//! ```

use crate::error::ConfigError;
use crate::types::secs_to_duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Routing key used when a region has no entry of its own in `region_sinks`.
pub const DEFAULT_ROUTE: &str = "default";

/// Minimum sleep between emissions in [`Mode::Safe`].
const SAFE_MODE_MIN_SLEEP: Duration = Duration::from_millis(10);

/// Top-level worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluxConfig {
    /// Regions users are partitioned into
    pub regions: Vec<RegionConfig>,
    /// Number of simulated users
    pub emitters: EmitterCount,
    /// Upper bound on concurrently in-flight emissions
    #[serde(default, alias = "emitters_per_worker")]
    pub max_concurrency: Option<usize>,
    /// Stream table: name -> weight and cadence
    pub streams: BTreeMap<String, StreamConfig>,
    /// Default sleep jitter for streams without their own `jitter_sec`
    #[serde(default)]
    pub time_jitter_sec: f64,
    /// Events per sealed batch
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
    /// Seal partially filled buffers after this many seconds (0 disables)
    #[serde(default)]
    pub flush_interval_sec: f64,
    /// Sealed batches that may wait per region before appends apply backpressure
    #[serde(default = "default_flush_queue_depth")]
    pub flush_queue_depth: usize,
    #[serde(default)]
    pub mode: Mode,
    /// Seed for deterministic user pools and emission randomness
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub sinks: BTreeMap<String, SinkConfig>,
    /// Region -> ordered sink names, plus an optional `default` entry
    #[serde(default)]
    pub region_sinks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_flush_batch_size() -> usize {
    100
}

fn default_flush_queue_depth() -> usize {
    64
}

impl FluxConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check every invariant the pipeline relies on.
    ///
    /// Unknown sink names in `region_sinks` are not an error here; the
    /// registry skips and logs them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() {
                return Err(ConfigError::InvalidSetting {
                    field: "regions.name",
                    value: region.name.clone(),
                });
            }
            if !seen.insert(region.name.as_str()) {
                return Err(ConfigError::DuplicateRegion(region.name.clone()));
            }
        }

        if self.emitters.num_users() == 0 {
            return Err(ConfigError::NoEmitters);
        }
        if self.effective_max_concurrency() == Some(0) {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.flush_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.flush_queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth);
        }
        if !is_non_negative(self.time_jitter_sec) {
            return Err(ConfigError::InvalidSetting {
                field: "time_jitter_sec",
                value: self.time_jitter_sec.to_string(),
            });
        }
        if !is_non_negative(self.flush_interval_sec) {
            return Err(ConfigError::InvalidSetting {
                field: "flush_interval_sec",
                value: self.flush_interval_sec.to_string(),
            });
        }

        self.validate_streams()?;

        for (name, sink) in &self.sinks {
            sink.validate(name)?;
        }

        self.metrics.validate()
    }

    fn validate_streams(&self) -> Result<(), ConfigError> {
        if self.streams.is_empty() {
            return Err(ConfigError::EmptyStreams);
        }
        for (name, stream) in &self.streams {
            if !is_non_negative(stream.weight) {
                return Err(ConfigError::InvalidWeight {
                    stream: name.clone(),
                    weight: stream.weight,
                });
            }
            if !is_non_negative(stream.interval_sec) {
                return Err(ConfigError::InvalidTiming {
                    stream: name.clone(),
                    field: "interval_sec",
                    value: stream.interval_sec,
                });
            }
            if let Some(jitter) = stream.jitter_sec {
                if !is_non_negative(jitter) {
                    return Err(ConfigError::InvalidTiming {
                        stream: name.clone(),
                        field: "jitter_sec",
                        value: jitter,
                    });
                }
            }
        }
        if self.streams.values().all(|s| s.weight == 0.0) {
            return Err(ConfigError::AllWeightsZero);
        }
        Ok(())
    }

    /// Region names in configuration order.
    pub fn region_names(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.name.clone()).collect()
    }

    /// Top-level `max_concurrency` wins over the one nested in `emitters`.
    pub fn effective_max_concurrency(&self) -> Option<usize> {
        self.max_concurrency.or_else(|| self.emitters.max_concurrency())
    }

    /// Rate limiter capacity: `min(max_concurrency, pool size)`.
    pub fn concurrency_limit(&self) -> usize {
        let users = self.emitters.num_users();
        self.effective_max_concurrency()
            .map_or(users, |max| max.min(users))
    }

    /// Sleep jitter for a stream, falling back to `time_jitter_sec`.
    pub fn jitter_for(&self, stream: &str) -> f64 {
        self.streams
            .get(stream)
            .and_then(|s| s.jitter_sec)
            .unwrap_or(self.time_jitter_sec)
    }

    pub fn flush_interval(&self) -> Option<Duration> {
        let interval = secs_to_duration(self.flush_interval_sec);
        (!interval.is_zero()).then_some(interval)
    }

    /// Keep only the sinks of one kind and route every region to them.
    ///
    /// Used by the `--sink` CLI override. When no sink of that kind is
    /// configured, a default-configured one named after the kind is added
    /// (only possible for kinds whose settings all have defaults).
    pub fn restrict_to_sink_kind(&mut self, kind: SinkKind) -> Result<(), ConfigError> {
        self.sinks.retain(|_, sink| sink.kind() == kind);
        if self.sinks.is_empty() {
            let sink = SinkConfig::default_for(kind).ok_or_else(|| ConfigError::InvalidSink {
                name: kind.to_string(),
                reason: format!("no '{kind}' sink is configured and it has required settings"),
            })?;
            self.sinks.insert(kind.to_string(), sink);
        }
        let names: Vec<String> = self.sinks.keys().cloned().collect();
        self.region_sinks.clear();
        self.region_sinks.insert(DEFAULT_ROUTE.to_string(), names);
        Ok(())
    }
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// A named region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
}

impl RegionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// User count, either as a plain number or `{ num_users, max_concurrency }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmitterCount {
    Count(usize),
    Detailed {
        num_users: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_concurrency: Option<usize>,
    },
}

impl EmitterCount {
    pub fn num_users(&self) -> usize {
        match self {
            EmitterCount::Count(n) => *n,
            EmitterCount::Detailed { num_users, .. } => *num_users,
        }
    }

    fn max_concurrency(&self) -> Option<usize> {
        match self {
            EmitterCount::Count(_) => None,
            EmitterCount::Detailed {
                max_concurrency, ..
            } => *max_concurrency,
        }
    }
}

/// Weight and cadence of one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub weight: f64,
    #[serde(default = "default_interval_sec")]
    pub interval_sec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_sec: Option<f64>,
}

fn default_interval_sec() -> f64 {
    1.0
}

impl StreamConfig {
    pub fn new(weight: f64, interval_sec: f64) -> Self {
        Self {
            weight,
            interval_sec,
            jitter_sec: None,
        }
    }
}

/// Emission pacing mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    /// Clamp every sleep to at least 10ms so zero intervals cannot spin
    Safe,
}

impl Mode {
    pub fn min_sleep(&self) -> Duration {
        match self {
            Mode::Normal => Duration::ZERO,
            Mode::Safe => SAFE_MODE_MIN_SLEEP,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Safe => write!(f, "safe"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Mode::Normal),
            "safe" => Ok(Mode::Safe),
            _ => Err(ConfigError::InvalidSetting {
                field: "mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Sink variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Mock,
    Http,
    Queue,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Mock => write!(f, "mock"),
            SinkKind::Http => write!(f, "http"),
            SinkKind::Queue => write!(f, "queue"),
        }
    }
}

impl std::str::FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(SinkKind::Mock),
            "http" | "fastapi" => Ok(SinkKind::Http),
            "queue" | "kafka" => Ok(SinkKind::Queue),
            _ => Err(ConfigError::InvalidSetting {
                field: "sink type",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration of one sink, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Mock(MockSinkConfig),
    #[serde(alias = "fastapi")]
    Http(HttpSinkConfig),
    #[serde(alias = "kafka")]
    Queue(QueueSinkConfig),
}

impl SinkConfig {
    pub fn kind(&self) -> SinkKind {
        match self {
            SinkConfig::Mock(_) => SinkKind::Mock,
            SinkConfig::Http(_) => SinkKind::Http,
            SinkConfig::Queue(_) => SinkKind::Queue,
        }
    }

    /// Default settings for a kind, if it has no required settings.
    pub fn default_for(kind: SinkKind) -> Option<Self> {
        match kind {
            SinkKind::Mock => Some(SinkConfig::Mock(MockSinkConfig::default())),
            SinkKind::Queue => Some(SinkConfig::Queue(QueueSinkConfig::default())),
            SinkKind::Http => None,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidSink {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        match self {
            SinkConfig::Mock(_) => Ok(()),
            SinkConfig::Http(http) => {
                if !(http.endpoint.starts_with("http://") || http.endpoint.starts_with("https://")) {
                    return Err(invalid("endpoint must be an http:// or https:// URL"));
                }
                if http.timeout_ms == 0 {
                    return Err(invalid("timeout_ms must be greater than zero"));
                }
                Ok(())
            }
            SinkConfig::Queue(queue) => {
                if queue.brokers.trim().is_empty() {
                    return Err(invalid("brokers must not be empty"));
                }
                if queue.topic_prefix.trim().is_empty() {
                    return Err(invalid("topic_prefix must not be empty"));
                }
                if queue.max_retries == 0 {
                    return Err(invalid("max_retries must be at least 1"));
                }
                Ok(())
            }
        }
    }
}

/// In-memory sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSinkConfig {
    /// Most recent batches kept in memory (older ones are only counted)
    pub retain_batches: usize,
}

impl Default for MockSinkConfig {
    fn default() -> Self {
        Self {
            retain_batches: 1024,
        }
    }
}

/// HTTP endpoint sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSinkConfig {
    pub endpoint: String,
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra request headers (e.g. authorization)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_http_timeout_ms() -> u64 {
    5000
}

impl HttpSinkConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_ms: default_http_timeout_ms(),
            headers: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Broker acknowledgment mode for the queue sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Fire and forget
    #[serde(alias = "0")]
    None,
    /// Partition leader only
    #[serde(alias = "1")]
    Leader,
    /// All in-sync replicas
    #[default]
    All,
}

impl AckMode {
    /// Value of the producer `acks` setting.
    pub fn as_acks(&self) -> &'static str {
        match self {
            AckMode::None => "0",
            AckMode::Leader => "1",
            AckMode::All => "all",
        }
    }
}

/// Message-queue sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSinkConfig {
    #[serde(alias = "bootstrap_servers")]
    pub brokers: String,
    pub topic_prefix: String,
    pub acks: AckMode,
    /// Attempts per event before it is dropped
    pub max_retries: u32,
    /// Delay unit between attempts; attempt `n` waits `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,
    pub message_timeout_ms: u64,
}

impl Default for QueueSinkConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic_prefix: "dataflux".to_string(),
            acks: AckMode::All,
            max_retries: 3,
            retry_backoff_ms: 100,
            message_timeout_ms: 5000,
        }
    }
}

impl QueueSinkConfig {
    pub fn topic_for(&self, region: &str) -> String {
        format!("{}.{}", self.topic_prefix, region)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Metrics aggregation and export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub tick_interval_sec: f64,
    pub rolling_window: usize,
    pub global_window: usize,
    /// Print the console report every N ticks
    pub report_every: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exporter: Option<ExporterConfig>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            tick_interval_sec: 1.0,
            rolling_window: 5,
            global_window: 30,
            report_every: 1,
            exporter: None,
        }
    }
}

impl MetricsConfig {
    pub fn tick_interval(&self) -> Duration {
        secs_to_duration(self.tick_interval_sec)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Sub-nanosecond values round to a zero Duration, which no timer accepts
        if self.tick_interval().is_zero() {
            return Err(ConfigError::InvalidSetting {
                field: "metrics.tick_interval_sec",
                value: self.tick_interval_sec.to_string(),
            });
        }
        if self.rolling_window == 0 || self.global_window == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "metrics window",
                value: format!("{}/{}", self.rolling_window, self.global_window),
            });
        }
        if let Some(exporter) = &self.exporter {
            if exporter.poll_interval().is_zero() {
                return Err(ConfigError::InvalidSetting {
                    field: "metrics.exporter.poll_interval_sec",
                    value: exporter.poll_interval_sec.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExporterConfig {
    pub listen: String,
    #[serde(default = "default_poll_interval_sec")]
    pub poll_interval_sec: f64,
}

fn default_poll_interval_sec() -> f64 {
    5.0
}

impl ExporterConfig {
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            poll_interval_sec: default_poll_interval_sec(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        secs_to_duration(self.poll_interval_sec)
    }
}
