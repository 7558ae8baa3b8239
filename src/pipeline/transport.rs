//! Delivery to the collector: HTTP transport, retry policy and the
//! offline buffer drain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};

use super::buffer::OfflineBuffer;
use super::envelope::{AckResponse, Envelope};

/// Health probes use a short timeout independent of the delivery one.
const HEALTH_TIMEOUT_MS: u64 = 5_000;

/// Outcome of one request, classified for the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    /// Connection refused, DNS failure, broken pipe and friends
    NetworkError,
    Timeout,
    /// The collector rejected the request; retrying cannot help
    Http4xx,
    /// The collector is unhealthy; retrying may help
    Http5xx,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::NetworkError => "network error",
            RequestStatus::Timeout => "timeout",
            RequestStatus::Http4xx => "HTTP 4xx",
            RequestStatus::Http5xx => "HTTP 5xx",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestStatus::NetworkError | RequestStatus::Timeout | RequestStatus::Http5xx
        )
    }
}

/// Low-level delivery operations, kept behind a trait so the retry
/// and buffering logic can be tested without a live collector.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> RequestStatus;
    async fn send_batch(&self, envelopes: &[Envelope]) -> RequestStatus;
    async fn check_health(&self) -> RequestStatus;
}

#[derive(Serialize)]
struct BatchBody<'a> {
    payloads: &'a [Envelope],
}

/// Talks JSON over HTTP to the collector.
pub struct HttpTransport {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
    device_id: String,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.delivery.timeout_ms))
            .build()
            .map_err(|err| AgentError::network_error(format!("HTTP client setup: {err}")))?;

        Ok(Self {
            client,
            server_url: config.server_url.clone(),
            api_key: config.api_key.clone(),
            device_id: config.device_id.clone(),
            timeout_ms: config.delivery.timeout_ms,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        }
    }

    /// A 2xx answer still needs a readable acknowledgement body;
    /// anything the collector garbles is treated as retryable.
    async fn classify_ack(&self, response: reqwest::Response) -> RequestStatus {
        let status = response.status();
        if status.is_success() {
            match response.json::<AckResponse>().await {
                Ok(ack) => {
                    if let Some(id) = ack.data.and_then(|data| data.id) {
                        debug!("Collector acknowledged envelope {}", id);
                    }
                    RequestStatus::Success
                }
                Err(err) => {
                    warn!("Unreadable acknowledgement from collector: {}", err);
                    RequestStatus::Http5xx
                }
            }
        } else {
            classify_http(status)
        }
    }
}

fn classify_http(status: reqwest::StatusCode) -> RequestStatus {
    if status.is_success() {
        RequestStatus::Success
    } else if status.is_client_error() {
        RequestStatus::Http4xx
    } else {
        RequestStatus::Http5xx
    }
}

fn classify_error(err: &reqwest::Error) -> RequestStatus {
    if err.is_timeout() {
        RequestStatus::Timeout
    } else {
        RequestStatus::NetworkError
    }
}

/// Derive the health endpoint from the telemetry endpoint.
fn health_url(server_url: &str) -> String {
    match server_url.strip_suffix("/telemetry") {
        Some(base) => format!("{base}/health"),
        None => server_url.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: &Envelope) -> RequestStatus {
        let request = self
            .client
            .post(&self.server_url)
            .header("X-Device-ID", &self.device_id)
            .header("X-Telemetry-Frequency", envelope.tier().as_str())
            .json(envelope);

        match self.authorize(request).send().await {
            Ok(response) => self.classify_ack(response).await,
            Err(err) => classify_error(&err),
        }
    }

    async fn send_batch(&self, envelopes: &[Envelope]) -> RequestStatus {
        let url = format!("{}/batch", self.server_url);
        let request = self
            .client
            .post(&url)
            .header("X-Device-ID", &self.device_id)
            .timeout(Duration::from_millis(self.timeout_ms * 2))
            .json(&BatchBody {
                payloads: envelopes,
            });

        match self.authorize(request).send().await {
            Ok(response) => {
                let status = classify_http(response.status());
                if status == RequestStatus::Success {
                    debug!("Collector accepted batch of {}", envelopes.len());
                }
                status
            }
            Err(err) => classify_error(&err),
        }
    }

    async fn check_health(&self) -> RequestStatus {
        let request = self
            .client
            .get(health_url(&self.server_url))
            .timeout(Duration::from_millis(HEALTH_TIMEOUT_MS));

        match request.send().await {
            Ok(response) => classify_http(response.status()),
            Err(err) => classify_error(&err),
        }
    }
}

/// Owns the retry policy and the offline buffer. One instance is
/// shared by all tier tasks.
pub struct Transporter {
    transport: Arc<dyn Transport>,
    buffer: Arc<Mutex<OfflineBuffer>>,
    retry_count: u32,
    retry_delay: Duration,
    buffering_enabled: bool,
    dry_run: bool,
}

impl Transporter {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        let buffer = Arc::new(Mutex::new(OfflineBuffer::new(config.buffer.max_size)));
        Ok(Self::with_transport(Arc::new(transport), config, buffer))
    }

    /// Build on a caller-supplied transport and buffer.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        config: &AgentConfig,
        buffer: Arc<Mutex<OfflineBuffer>>,
    ) -> Self {
        Self {
            transport,
            buffer,
            retry_count: config.delivery.retry_count.max(1),
            retry_delay: Duration::from_millis(config.delivery.retry_delay_ms),
            buffering_enabled: config.buffer.enabled,
            dry_run: config.dry_run,
        }
    }

    /// Deliver one envelope, retrying transient failures with linear
    /// backoff. Returns whether the collector accepted it. Undelivered
    /// envelopes land in the offline buffer when buffering is on.
    pub async fn send(&self, envelope: Envelope) -> bool {
        if self.dry_run {
            let size = serde_json::to_string(&envelope).map_or(0, |body| body.len());
            info!(
                "[dry-run] {} envelope for {} ({} bytes)",
                envelope.frequency, envelope.device_id, size
            );
            return true;
        }

        for attempt in 1..=self.retry_count {
            match self.transport.send(&envelope).await {
                RequestStatus::Success => {
                    debug!(
                        "Delivered {} envelope on attempt {}",
                        envelope.frequency, attempt
                    );
                    self.drain_buffer().await;
                    return true;
                }
                RequestStatus::Http4xx => {
                    warn!(
                        "Collector rejected {} envelope, not retrying",
                        envelope.frequency
                    );
                    break;
                }
                status => {
                    warn!(
                        "Delivery attempt {}/{} failed: {}",
                        attempt,
                        self.retry_count,
                        status.as_str()
                    );
                    if attempt < self.retry_count {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        if self.buffering_enabled {
            let mut buffer = self.buffer.lock().await;
            buffer.push(envelope);
            debug!("Envelope buffered offline ({} queued)", buffer.len());
        }
        false
    }

    /// Replay buffered envelopes oldest-first, one batch request per
    /// entry. Stops at the first failure and leaves the rest queued.
    /// The buffer lock is held throughout so concurrent successes do
    /// not interleave their drains.
    async fn drain_buffer(&self) {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return;
        }

        info!("Draining offline buffer ({} entries)", buffer.len());
        while let Some(oldest) = buffer.peek_oldest() {
            let status = self
                .transport
                .send_batch(std::slice::from_ref(oldest))
                .await;
            if status != RequestStatus::Success {
                warn!(
                    "Buffer drain halted: {} ({} entries left)",
                    status.as_str(),
                    buffer.len()
                );
                return;
            }
            buffer.pop_oldest();
        }
        info!("Offline buffer drained");
    }

    /// Advisory reachability probe; failures are logged, never fatal.
    pub async fn check_health(&self) -> bool {
        if self.dry_run {
            debug!("[dry-run] skipping collector health check");
            return true;
        }

        match self.transport.check_health().await {
            RequestStatus::Success => {
                info!("Collector reachable");
                true
            }
            status => {
                warn!(
                    "Collector health check failed ({}), continuing anyway",
                    status.as_str()
                );
                false
            }
        }
    }

    pub async fn buffer_len(&self) -> usize {
        self.buffer.lock().await.len()
    }
}
