//! # promptgate-gateway
//!
//! Scan-then-generate orchestration. Every user turn is scanned by the remote
//! content-security API first; generation runs only when the reconciled
//! verdict is an explicit allow.
//!
//! ## Modules
//!
//! - [`config`]: secrets from the environment, tunables from TOML and
//!   `PROMPTGATE__*` overrides
//! - [`generation`]: the [`Generator`] seam and the chat-completions client
//! - [`turn`]: per-turn state machine and record
//! - [`gateway`]: the [`Gateway`] orchestrator

pub mod config;
pub mod error;
pub mod gateway;
pub mod generation;
pub mod turn;

pub use config::{
    ApiKey, GatewayConfig, GenerationSettings, Provider, ScanSettings, Tunables,
    SCAN_API_KEY_VAR, SCAN_ENDPOINT_VAR, SCAN_PROFILE_VAR,
};
pub use error::{ConfigError, GatewayError, GenerationError};
pub use gateway::{Gateway, GatewayBuilder, TurnOutcome};
pub use generation::{ChatCompletionsGenerator, Generator};
pub use turn::{TransitionError, TurnRecord, TurnState};

pub use promptgate_core::{
    Action, Classification, Decision, Reason, ScanError, ScanResponse, ThreatCategory,
    ThreatOrigin, Verdict,
};
