//! Single-attempt HTTP transport.

use async_trait::async_trait;
use promptgate_core::TransportError;
use std::time::Duration;

/// One outbound POST.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Serialized request body.
    pub body: Vec<u8>,
    pub timeout: Duration,
}

/// A successful (2xx) HTTP answer.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Issues exactly one network call per `send`. No retries.
///
/// Non-success statuses are reported as [`TransportError::HttpStatus`] so the
/// retry policy sees every failure through the same type.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            TransportError::Connection(format!("failed to initialise HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }

    /// Reuse an existing client (custom TLS roots, proxies, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(e, request.timeout))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(e, request.timeout))?;

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

fn classify_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_decode() || err.is_body() {
        TransportError::Malformed(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}
