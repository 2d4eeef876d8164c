//! Error types for scan transport and scan operations.

use std::time::Duration;

/// Failure of a single transport attempt.
///
/// A transport never retries; the retry policy decides what to do with each
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No complete response arrived within the request timeout.
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body could not be read or decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// HTTP status carried by this failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of a whole scan operation (all attempts included).
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The scan API rejected the API key (HTTP 401). Never retried.
    #[error("security authentication failed: the scan API rejected the API key")]
    Authentication,

    /// The configured security profile does not exist (HTTP 404). Never retried.
    #[error("security profile not found: {profile}")]
    ProfileNotFound { profile: String },

    /// Every attempt failed with a retryable error.
    #[error("security scan failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    /// The request could not be built from the configured profile.
    #[error("invalid scan request: {0}")]
    InvalidRequest(String),

    /// The blocking scan could not start its private runtime.
    #[error("scan runtime unavailable: {0}")]
    Runtime(String),
}

impl ScanError {
    /// Whether this error came from a terminal service answer rather than
    /// from running out of attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanError::Authentication | ScanError::ProfileNotFound { .. }
        )
    }
}
