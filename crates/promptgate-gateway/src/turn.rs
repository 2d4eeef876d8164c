//! Per-turn state tracking.
//!
//! ```text
//! Idle ─▶ Scanning ─┬─▶ Blocked
//!                   ├─▶ Approved ─▶ Generating ─▶ Completed
//!                   └─▶ ScanFailed
//! ```
//!
//! A [`TurnRecord`] is append-only: states are pushed in order and an illegal
//! transition is refused rather than recorded.

use chrono::{DateTime, Utc};
use promptgate_core::CorrelationId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of one user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Scanning,
    Blocked,
    Approved,
    Generating,
    Completed,
    ScanFailed,
}

impl TurnState {
    pub fn can_transition(self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Idle, Scanning)
                | (Scanning, Blocked)
                | (Scanning, Approved)
                | (Scanning, ScanFailed)
                | (Approved, Generating)
                | (Generating, Completed)
        )
    }

    /// No further transitions leave this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnState::Blocked | TurnState::Completed | TurnState::ScanFailed
        )
    }
}

/// Refused state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal turn transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: TurnState,
    pub to: TurnState,
}

/// What happened during one turn, for logs and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub turn_id: Uuid,
    /// Correlation id of the scan, once one was issued.
    pub correlation_id: Option<CorrelationId>,
    /// RFC 3339 start timestamp.
    pub started_at: String,
    pub ended_at: Option<String>,
    /// Every state visited, starting with `Idle`.
    pub states: Vec<TurnState>,
    pub duration_ms: Option<u64>,
}

impl TurnRecord {
    pub fn start() -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            correlation_id: None,
            started_at: Utc::now().to_rfc3339(),
            ended_at: None,
            states: vec![TurnState::Idle],
            duration_ms: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.states.last().copied().unwrap_or(TurnState::Idle)
    }

    pub fn transition(&mut self, next: TurnState) -> Result<(), TransitionError> {
        let current = self.state();
        if !current.can_transition(next) {
            return Err(TransitionError {
                from: current,
                to: next,
            });
        }
        self.states.push(next);
        Ok(())
    }

    pub fn visited(&self, state: TurnState) -> bool {
        self.states.contains(&state)
    }

    /// Stamp the end time and duration.
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.ended_at = Some(now.to_rfc3339());

        if let Ok(start) = DateTime::parse_from_rfc3339(&self.started_at) {
            let elapsed = (now - start.with_timezone(&Utc)).num_milliseconds();
            self.duration_ms = Some(elapsed.max(0) as u64);
        }
    }
}
