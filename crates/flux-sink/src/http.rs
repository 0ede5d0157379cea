//! HTTP endpoint sink.
//!
//! Each flushed batch becomes one `POST <endpoint>` with the body
//!
//! ```json
//! {"region": "us-east", "events": [ ... ]}
//! ```
//!
//! A 2xx response delivers the whole batch. Any other status, a timeout or a
//! transport error fails the whole batch. There is exactly one attempt per
//! flush.

use crate::error::SinkError;
use crate::metrics::SinkMetricsRecorder;
use crate::traits::Sink;
use flux_core::{Batch, Event, HttpSinkConfig, SinkKind};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Longest response body kept in a [`SinkError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct Payload<'a> {
    region: &'a str,
    events: &'a [Event],
}

pub struct HttpSink {
    name: String,
    config: HttpSinkConfig,
    client: OnceCell<Client>,
    closed: AtomicBool,
    recorder: SinkMetricsRecorder,
}

impl HttpSink {
    pub fn new(name: impl Into<String>, config: HttpSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            client: OnceCell::new(),
            closed: AtomicBool::new(false),
            recorder: SinkMetricsRecorder::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn build_client(&self) -> Result<Client, SinkError> {
        let init_error = |reason: String| SinkError::Init {
            sink: self.name.clone(),
            reason,
        };

        let mut headers = HeaderMap::new();
        for (key, value) in &self.config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| init_error(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| init_error(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        Client::builder()
            .timeout(self.config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| init_error(e.to_string()))
    }

    async fn client(&self) -> Result<&Client, SinkError> {
        self.client
            .get_or_try_init(|| async { self.build_client() })
            .await
    }
}

#[async_trait::async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Http
    }

    async fn initialize(&self) -> Result<(), SinkError> {
        self.client().await?;
        info!(sink = %self.name, endpoint = %self.config.endpoint, "HTTP sink ready");
        Ok(())
    }

    async fn deliver(&self, batch: &Batch) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(SinkError::Closed(self.name.clone()));
        }
        let client = self.client().await?;
        let payload = Payload {
            region: &batch.region,
            events: &batch.events,
        };

        let start = Instant::now();
        let response = client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = truncate_body(response.text().await.unwrap_or_default());
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let elapsed = start.elapsed();
        self.recorder.record_success(batch.len(), elapsed);
        debug!(
            sink = %self.name,
            region = %batch.region,
            events = batch.len(),
            latency_ms = elapsed.as_millis() as u64,
            "Posted batch"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn recorder(&self) -> &SinkMetricsRecorder {
        &self.recorder
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    body
}
