//! # promptgate-client
//!
//! Retrying client for the remote content-security scan API.
//!
//! ## Layers
//!
//! - [`Transport`]: one HTTP POST with a timeout and typed failures
//! - [`RetryPolicy`]: bounded exponential backoff; 401/404 are terminal
//! - [`ScanClient`]: builds the request, drives the policy, decodes the
//!   response and records whole-operation latency
//!
//! The async form (`scan().await`) is the implementation; the blocking form
//! (`scan_blocking`) only changes how the caller waits for it.

pub mod client;
pub mod retry;
pub mod transport;

// Primary exports
pub use client::{ScanClient, ScanClientBuilder, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, SCAN_PATH};
pub use retry::{classify, Disposition, RetryError, RetryPolicy};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

// Re-export the data model so most callers need a single dependency
pub use promptgate_core::{
    interpret, Decision, ScanError, ScanRequest, ScanResponse, TransportError, Verdict,
};
