//! Verdict reconciliation and threat extraction.
//!
//! Classification and recommended action arrive as independent fields and can
//! disagree. Reconciliation is fail-safe: any malicious or block signal wins,
//! only an explicit benign + allow pair is an allow, and everything else is
//! indeterminate.

use crate::response::{Action, Classification, ScanResponse};
use crate::threat::{ThreatCategory, ThreatOrigin};
use std::fmt;

/// Final decision for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block,
    /// Neither allow nor block was asserted. Callers must treat this as a block.
    Indeterminate,
}

impl Verdict {
    /// Only an explicit allow lets content through to generation.
    pub fn permits_generation(self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => f.write_str("allow"),
            Verdict::Block => f.write_str("block"),
            Verdict::Indeterminate => f.write_str("indeterminate"),
        }
    }
}

/// One detected threat and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub category: ThreatCategory,
    pub origin: ThreatOrigin,
}

/// Verdict plus the ordered reasons behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub reasons: Vec<Reason>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.verdict.permits_generation()
    }

    pub fn has_reason(&self, category: &ThreatCategory, origin: ThreatOrigin) -> bool {
        self.reasons
            .iter()
            .any(|r| &r.category == category && r.origin == origin)
    }

    /// Reasons for one origin, in response order.
    pub fn reasons_from(&self, origin: ThreatOrigin) -> impl Iterator<Item = &Reason> {
        self.reasons.iter().filter(move |r| r.origin == origin)
    }
}

/// Reconcile the two remote fields into a verdict.
pub fn reconcile(classification: Classification, action: Action) -> Verdict {
    if classification == Classification::Malicious || action == Action::Block {
        Verdict::Block
    } else if classification == Classification::Benign && action == Action::Allow {
        Verdict::Allow
    } else {
        Verdict::Indeterminate
    }
}

/// Map a scan response to a decision.
///
/// Input threats come first, then predicted output threats, each in response
/// order. A malicious classification with no flag set yields one synthesized
/// [`ThreatCategory::PolicyViolation`] reason tagged as input.
pub fn interpret(response: &ScanResponse) -> Decision {
    let verdict = reconcile(response.classification, response.recommended_action);

    let mut reasons: Vec<Reason> = response
        .input_threats
        .detected()
        .map(|category| Reason {
            category: category.clone(),
            origin: ThreatOrigin::Input,
        })
        .chain(response.predicted_output_threats.detected().map(|category| Reason {
            category: category.clone(),
            origin: ThreatOrigin::PredictedOutput,
        }))
        .collect();

    if reasons.is_empty() && response.classification == Classification::Malicious {
        reasons.push(Reason {
            category: ThreatCategory::PolicyViolation,
            origin: ThreatOrigin::Input,
        });
    }

    Decision { verdict, reasons }
}
