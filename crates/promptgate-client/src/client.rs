//! ScanClient - the retrying scan operation.
//!
//! One core algorithm ([`ScanClient::scan_request`]) serves both call styles:
//! `scan().await` for async callers and [`ScanClient::scan_blocking`] for
//! synchronous ones. Retry counts, backoff timing and error classification are
//! therefore identical between the two.

use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Transport, TransportRequest};
use promptgate_core::{ScanError, ScanRequest, ScanResponse, TransportError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Production scan service.
pub const DEFAULT_ENDPOINT: &str = "https://service.api.aisecurity.paloaltonetworks.com";

/// Synchronous scan route, appended to the endpoint.
pub const SCAN_PATH: &str = "/v1/scan/sync/request";

/// Per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("promptgate/", env!("CARGO_PKG_VERSION"));

/// Client for the remote content-security scan API.
///
/// Cheap to clone; clones share the transport and the read-only settings.
/// Concurrent scans share nothing mutable: each owns its correlation id,
/// attempt counter and backoff timer.
///
/// # Example
///
/// ```rust,ignore
/// use promptgate_client::ScanClient;
///
/// let client = ScanClient::builder()
///     .with_api_key("pan-api-key")
///     .with_profile("dev-profile")
///     .build()?;
///
/// let response = client.scan("What is the weather today?").await?;
/// println!("{:?} in {:.1}ms", response.classification, response.latency_ms);
/// ```
#[derive(Clone)]
pub struct ScanClient {
    transport: Arc<dyn Transport>,
    endpoint: String,
    api_key: String,
    profile_name: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl fmt::Debug for ScanClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("profile_name", &self.profile_name)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ScanClient {
    /// Create a builder for a custom ScanClient.
    pub fn builder() -> ScanClientBuilder {
        ScanClientBuilder::new()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Full URL of the synchronous scan route.
    pub fn scan_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), SCAN_PATH)
    }

    /// Build a request for `content` with a fresh correlation id.
    pub fn prepare(&self, content: &str) -> Result<ScanRequest, ScanError> {
        ScanRequest::build(content, &self.profile_name)
    }

    /// Scan `content` without blocking the calling task.
    pub async fn scan(&self, content: &str) -> Result<ScanResponse, ScanError> {
        let request = self.prepare(content)?;
        self.scan_request(&request).await
    }

    /// Scan `content`, blocking the current thread until the result is known.
    ///
    /// Runs the same algorithm as [`ScanClient::scan`] on a private
    /// current-thread runtime. Must not be called from inside an async
    /// runtime; use `scan().await` there.
    pub fn scan_blocking(&self, content: &str) -> Result<ScanResponse, ScanError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ScanError::Runtime(
                "scan_blocking called from within an async runtime; use scan().await".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScanError::Runtime(e.to_string()))?;

        runtime.block_on(self.scan(content))
    }

    /// Execute a prepared request with retries.
    ///
    /// `latency_ms` on the result covers the whole operation, backoff
    /// included.
    pub async fn scan_request(&self, request: &ScanRequest) -> Result<ScanResponse, ScanError> {
        let started = Instant::now();

        let body = serde_json::to_vec(&request.to_wire())
            .map_err(|e| ScanError::InvalidRequest(e.to_string()))?;
        let outbound = TransportRequest {
            url: self.scan_url(),
            headers: self.headers(),
            body,
            timeout: self.timeout,
        };

        info!(
            correlation_id = %request.correlation_id,
            profile = %request.policy_profile,
            content_len = request.content.len(),
            "Starting security scan"
        );

        let result = self
            .retry
            .execute(|attempt| self.attempt(&outbound, attempt))
            .await;

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(mut response) => {
                response.latency_ms = latency_ms;
                info!(
                    correlation_id = %request.correlation_id,
                    classification = ?response.classification,
                    action = ?response.recommended_action,
                    latency_ms,
                    "Security scan completed"
                );
                Ok(response)
            }
            Err(err) => {
                let err = err.into_scan_error(&request.policy_profile);
                warn!(
                    correlation_id = %request.correlation_id,
                    error = %err,
                    latency_ms,
                    "Security scan failed"
                );
                Err(err)
            }
        }
    }

    async fn attempt(
        &self,
        outbound: &TransportRequest,
        attempt: u32,
    ) -> Result<ScanResponse, TransportError> {
        debug!(attempt = attempt + 1, url = %outbound.url, "Sending scan request");
        let raw = self.transport.send(outbound).await?;
        ScanResponse::from_slice(&raw.body).map_err(|e| {
            TransportError::Malformed(format!("scan response is not valid JSON: {}", e))
        })
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
            ("x-pan-token".to_string(), self.api_key.clone()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ]
    }
}

/// Builder for [`ScanClient`].
pub struct ScanClientBuilder {
    endpoint: String,
    api_key: String,
    profile_name: String,
    timeout: Duration,
    retry: RetryPolicy,
    transport: Option<Arc<dyn Transport>>,
}

impl ScanClientBuilder {
    fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            profile_name: String::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            transport: None,
        }
    }

    /// Override the scan service base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the scan API key (required).
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the security profile name (required).
    pub fn with_profile(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = profile_name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use a custom transport instead of the default HTTP one.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ScanClient, ScanError> {
        if self.api_key.trim().is_empty() {
            return Err(ScanError::InvalidRequest(
                "scan API key is required".to_string(),
            ));
        }
        if self.profile_name.trim().is_empty() {
            return Err(ScanError::InvalidRequest(
                "security profile name is required".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ScanError::InvalidRequest(
                "scan endpoint must not be empty".to_string(),
            ));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new().map_err(|e| ScanError::Runtime(e.to_string()))?),
        };

        Ok(ScanClient {
            transport,
            endpoint: self.endpoint,
            api_key: self.api_key,
            profile_name: self.profile_name,
            timeout: self.timeout,
            retry: self.retry,
        })
    }
}
