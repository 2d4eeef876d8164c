//! Threat categories reported by the scan service.

use std::borrow::Cow;
use std::fmt;

/// Tag for one kind of detected threat.
///
/// Known service codes map to dedicated variants; anything else is kept as
/// [`ThreatCategory::Unrecognized`] with the raw code so new detectors on the
/// service side still surface to the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreatCategory {
    /// Instructions crafted to hijack the model (`prompt_injection`, `injection`).
    PromptInjection,
    /// Attempts to lift model safety restrictions (`jailbreak`).
    Jailbreak,
    /// Role-play or identity claims aimed at an agent (`agent`).
    AgentManipulation,
    /// Harassment, hate speech, offensive material (`toxic_content`, `toxicity`).
    Toxicity,
    /// Sensitive data exposure (`dlp`).
    DataLoss,
    /// Phishing or malware links (`url_cats`).
    MaliciousUrl,
    /// Harmful code (`malicious_code`).
    MaliciousCode,
    /// Content flagged malicious with no individual category isolated.
    PolicyViolation,
    /// A code this build does not know about.
    Unrecognized(String),
}

impl ThreatCategory {
    /// Map a service detector code to a category.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "prompt_injection" | "injection" => ThreatCategory::PromptInjection,
            "jailbreak" => ThreatCategory::Jailbreak,
            "agent" => ThreatCategory::AgentManipulation,
            "toxic_content" | "toxicity" => ThreatCategory::Toxicity,
            "dlp" => ThreatCategory::DataLoss,
            "url_cats" => ThreatCategory::MaliciousUrl,
            "malicious_code" => ThreatCategory::MaliciousCode,
            "policy_violation" => ThreatCategory::PolicyViolation,
            _ => ThreatCategory::Unrecognized(code.to_string()),
        }
    }

    /// Canonical code for this category.
    pub fn code(&self) -> &str {
        match self {
            ThreatCategory::PromptInjection => "prompt_injection",
            ThreatCategory::Jailbreak => "jailbreak",
            ThreatCategory::AgentManipulation => "agent",
            ThreatCategory::Toxicity => "toxic_content",
            ThreatCategory::DataLoss => "dlp",
            ThreatCategory::MaliciousUrl => "url_cats",
            ThreatCategory::MaliciousCode => "malicious_code",
            ThreatCategory::PolicyViolation => "policy_violation",
            ThreatCategory::Unrecognized(raw) => raw,
        }
    }

    /// Human-readable label, stable across releases.
    pub fn label(&self) -> Cow<'static, str> {
        let label = match self {
            ThreatCategory::PromptInjection => "Prompt Injection Attack",
            ThreatCategory::Jailbreak => "Jailbreak Attempt",
            ThreatCategory::AgentManipulation => "AI Agent Manipulation",
            ThreatCategory::Toxicity => "Toxic Content",
            ThreatCategory::DataLoss => "Data Loss Prevention",
            ThreatCategory::MaliciousUrl => "Malicious URL Detection",
            ThreatCategory::MaliciousCode => "Malicious Code",
            ThreatCategory::PolicyViolation => "General Security Policy Violation",
            ThreatCategory::Unrecognized(raw) => return Cow::Owned(derive_label(raw)),
        };
        Cow::Borrowed(label)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ThreatCategory::Unrecognized(_))
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<&str> for ThreatCategory {
    fn from(code: &str) -> Self {
        ThreatCategory::from_code(code)
    }
}

/// Where a threat was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatOrigin {
    /// In the content the user submitted.
    Input,
    /// In the reply the service predicts the model would generate.
    PredictedOutput,
}

impl fmt::Display for ThreatOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatOrigin::Input => f.write_str("input"),
            ThreatOrigin::PredictedOutput => f.write_str("predicted output"),
        }
    }
}

/// `some_new_code` -> `Some New Code`
fn derive_label(raw: &str) -> String {
    let words: Vec<String> = raw
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Unnamed Threat".to_string()
    } else {
        words.join(" ")
    }
}
