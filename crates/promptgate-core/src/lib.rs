//! # promptgate-core
//!
//! Data model and decision logic shared by every promptgate crate.
//!
//! ## Overview
//!
//! A scan is one round trip to the remote content-security service. This crate
//! owns everything about that round trip that does not touch the network:
//!
//! - **Requests**: [`ScanRequest`] with a fresh [`CorrelationId`] per turn
//! - **Responses**: [`ScanResponse`], decoded leniently from the service JSON
//! - **Threats**: the exhaustive [`ThreatCategory`] tag with an
//!   `Unrecognized` fallback so new service codes are never dropped
//! - **Verdicts**: [`interpret`] reconciles classification and action into a
//!   [`Decision`]
//! - **Errors**: [`TransportError`] for single attempts, [`ScanError`] for the
//!   whole scan operation
//!
//! ## Quick Start
//!
//! ```rust
//! use promptgate_core::{interpret, ScanResponse, ThreatCategory, ThreatOrigin, Verdict};
//!
//! let body = br#"{
//!     "category": "malicious",
//!     "action": "block",
//!     "prompt_detected": { "prompt_injection": true }
//! }"#;
//!
//! let response = ScanResponse::from_slice(body).unwrap();
//! let decision = interpret(&response);
//!
//! assert_eq!(decision.verdict, Verdict::Block);
//! assert!(decision.has_reason(&ThreatCategory::PromptInjection, ThreatOrigin::Input));
//! ```

pub mod error;
pub mod request;
pub mod response;
pub mod threat;
pub mod verdict;

// Primary exports
pub use error::{ScanError, TransportError};
pub use request::{CorrelationId, ScanRequest};
pub use response::{Action, Classification, ScanMetadata, ScanResponse, ThreatFlags};
pub use threat::{ThreatCategory, ThreatOrigin};
pub use verdict::{interpret, reconcile, Decision, Reason, Verdict};
