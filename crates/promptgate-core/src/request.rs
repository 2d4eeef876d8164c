//! Scan request construction.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique token tagging one scan request (`tr_id` on the wire).
///
/// Backed by a random UUID v4, so collisions between requests are
/// negligible without any coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Canonical request for one synchronous scan.
///
/// Created once per user turn and consumed by a single scan operation. The
/// content is kept exactly as the user submitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Fresh per request, never reused.
    pub correlation_id: CorrelationId,
    /// Security profile the service should evaluate against.
    pub policy_profile: String,
    /// Unmodified user text.
    pub content: String,
}

impl ScanRequest {
    /// Build a request with a new correlation id.
    ///
    /// Fails only when the profile name is empty or whitespace.
    pub fn build(content: impl Into<String>, profile_name: &str) -> Result<Self, ScanError> {
        if profile_name.trim().is_empty() {
            return Err(ScanError::InvalidRequest(
                "security profile name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            correlation_id: CorrelationId::generate(),
            policy_profile: profile_name.to_string(),
            content: content.into(),
        })
    }

    /// JSON body expected by the scan API.
    pub fn to_wire(&self) -> serde_json::Value {
        let wire = WireRequest {
            tr_id: &self.correlation_id,
            ai_profile: WireProfile {
                profile_name: &self.policy_profile,
            },
            contents: vec![WireContent {
                prompt: &self.content,
            }],
        };
        // Plain structs of strings always serialize.
        serde_json::to_value(wire).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    tr_id: &'a CorrelationId,
    ai_profile: WireProfile<'a>,
    contents: Vec<WireContent<'a>>,
}

#[derive(Serialize)]
struct WireProfile<'a> {
    profile_name: &'a str,
}

#[derive(Serialize)]
struct WireContent<'a> {
    prompt: &'a str,
}
