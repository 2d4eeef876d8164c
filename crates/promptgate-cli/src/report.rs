//! Human-readable rendering of scan results and turn outcomes.

use promptgate_core::{CorrelationId, Decision, ScanResponse, ThreatCategory, ThreatOrigin, Verdict};
use promptgate_gateway::{GenerationError, ScanError, TurnOutcome};
use std::io::{self, Write};

const RULE: &str = "========================================";

/// What went wrong and how to rephrase, for one detected threat.
pub fn remediation(category: &ThreatCategory, origin: ThreatOrigin) -> (&'static str, &'static str) {
    use ThreatCategory::*;
    match origin {
        ThreatOrigin::Input => match category {
            PromptInjection | Jailbreak => (
                "malicious AI instruction patterns detected",
                "rephrase without command-like language",
            ),
            AgentManipulation => (
                "AI agent manipulation attempt detected",
                "remove role-playing or identity claims",
            ),
            Toxicity => (
                "harmful or offensive content identified",
                "use respectful, appropriate language",
            ),
            MaliciousUrl => (
                "malicious URL detected in message",
                "remove suspicious links",
            ),
            DataLoss => (
                "sensitive data exposure risk",
                "remove personal or confidential information",
            ),
            MaliciousCode => (
                "malicious code detected in message",
                "remove code or scripts from your message",
            ),
            PolicyViolation | Unrecognized(_) => (
                "message violates security policies",
                "modify your message to be safer and more appropriate",
            ),
        },
        ThreatOrigin::PredictedOutput => match category {
            MaliciousUrl => (
                "the reply might contain malicious links",
                "rephrase to avoid requesting potentially harmful links",
            ),
            DataLoss => (
                "the reply might leak sensitive data",
                "avoid requesting personal or confidential information",
            ),
            Toxicity => (
                "the reply might contain harmful content",
                "use respectful, appropriate language in your question",
            ),
            PromptInjection | Jailbreak | AgentManipulation => (
                "the model might be tricked into malicious behavior",
                "remove command-like or instructional language",
            ),
            MaliciousCode | PolicyViolation | Unrecognized(_) => (
                "the reply might violate security policies",
                "modify your question to be safer and more appropriate",
            ),
        },
    }
}

/// Scan summary followed by every detected threat, grouped by origin.
///
/// `correlation_id` is the id the request was sent with; it is shown when the
/// service does not echo a `tr_id` back.
pub fn render_scan<W: Write>(
    out: &mut W,
    response: &ScanResponse,
    decision: &Decision,
    correlation_id: Option<CorrelationId>,
) -> io::Result<()> {
    let meta = &response.raw_metadata;
    writeln!(out, "\nSECURITY SCAN RESULTS")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Classification:     {}", response.classification)?;
    writeln!(out, "Recommended action: {}", response.recommended_action)?;
    if let Some(name) = &meta.profile_name {
        writeln!(out, "Profile:            {name}")?;
    }
    if let Some(id) = &meta.profile_id {
        writeln!(out, "Profile id:         {id}")?;
    }
    writeln!(out, "Scan latency:       {:.1} ms", response.latency_ms)?;
    let correlation = meta
        .tr_id
        .clone()
        .or_else(|| correlation_id.map(|id| id.to_string()));
    for (label, value) in [
        ("Correlation id:     ", &correlation),
        ("Report id:          ", &meta.report_id),
        ("Scan id:            ", &meta.scan_id),
    ] {
        if let Some(value) = value {
            writeln!(out, "{label}{value}")?;
        }
    }

    if decision.reasons.is_empty() {
        writeln!(out, "\nNo threats detected")?;
    }

    for (origin, heading) in [
        (ThreatOrigin::Input, "THREATS IN YOUR MESSAGE"),
        (ThreatOrigin::PredictedOutput, "THREATS PREDICTED IN THE REPLY"),
    ] {
        let mut reasons = decision.reasons_from(origin).peekable();
        if reasons.peek().is_none() {
            continue;
        }
        writeln!(out, "\n{heading}:")?;
        for reason in reasons {
            let (issue, fix) = remediation(&reason.category, origin);
            writeln!(out, "  - {}", reason.category.label())?;
            writeln!(out, "      issue: {issue}")?;
            writeln!(out, "      fix:   {fix}")?;
        }
    }
    writeln!(out, "{RULE}")
}

/// Full rendering of one turn.
pub fn render_outcome<W: Write>(out: &mut W, outcome: &TurnOutcome) -> io::Result<()> {
    let correlation_id = outcome.record().correlation_id;
    match outcome {
        TurnOutcome::Rejected { .. } => writeln!(out, "Please enter a non-empty message."),
        TurnOutcome::Blocked {
            response, decision, ..
        } => {
            render_scan(out, response, decision, correlation_id)?;
            if decision.verdict == Verdict::Indeterminate {
                writeln!(out, "\nUNEXPECTED SECURITY RESULT")?;
                writeln!(
                    out,
                    "Classification `{}` with action `{}` is neither an allow nor a block.",
                    response.classification, response.recommended_action
                )?;
                writeln!(out, "The message was blocked. Please verify the security profile configuration.")
            } else {
                writeln!(out, "\nMESSAGE BLOCKED BY SECURITY")?;
                writeln!(
                    out,
                    "This message cannot be processed due to security policy violations. \
                     Please modify your message and try again."
                )
            }
        }
        TurnOutcome::Completed {
            response,
            decision,
            reply,
            ..
        } => {
            render_scan(out, response, decision, correlation_id)?;
            writeln!(out, "\nSECURITY CHECK PASSED")?;
            match reply {
                Ok(text) => {
                    writeln!(out, "\nASSISTANT:")?;
                    writeln!(out, "{text}")
                }
                Err(err) => render_generation_error(out, err),
            }
        }
        TurnOutcome::ScanFailed { error, .. } => render_scan_error(out, error),
    }
}

fn render_generation_error<W: Write>(out: &mut W, err: &GenerationError) -> io::Result<()> {
    writeln!(out, "\nGENERATION FAILED: {err}")?;
    writeln!(
        out,
        "Your message passed security screening, but no reply could be produced. Please try again later."
    )
}

fn render_scan_error<W: Write>(out: &mut W, err: &ScanError) -> io::Result<()> {
    writeln!(out, "\nSECURITY SCAN FAILED: {err}")?;
    let hint = match err {
        ScanError::Authentication => "Check PANW_AI_SEC_API_KEY.",
        ScanError::ProfileNotFound { .. } => "Check PANW_AI_SEC_PROFILE_NAME.",
        ScanError::RetriesExhausted { .. } => {
            "Check network connectivity and the scan endpoint."
        }
        ScanError::InvalidRequest(_) | ScanError::Runtime(_) => {
            "Check the gateway configuration."
        }
    };
    writeln!(out, "The message was not sent to the model. {hint}")
}
