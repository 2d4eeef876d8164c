//! Line-oriented chat loop.

use crate::report;
use promptgate_gateway::{Gateway, TurnOutcome};
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Typing this (any case) ends the session.
pub const EXIT_SENTINEL: &str = "exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed the exit sentinel.
    Exit,
    /// Input was closed.
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Turns that reached the scanner.
    pub turns: usize,
    pub end: SessionEnd,
}

pub fn is_exit(message: &str) -> bool {
    message.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Remove the line terminator only; the message itself is passed on untouched.
fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Read messages from `input` and answer each on `out` until exit or EOF.
///
/// Dropping the returned future mid-turn abandons that turn, including its
/// in-flight requests and backoff sleeps.
pub async fn run<R, W>(gateway: &Gateway, input: &mut R, out: &mut W) -> io::Result<SessionSummary>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut line = Vec::new();
    let mut turns = 0;

    loop {
        write!(out, "\nYou: ")?;
        out.flush()?;

        line.clear();
        if input.read_until(b'\n', &mut line).await? == 0 {
            writeln!(out)?;
            return Ok(SessionSummary {
                turns,
                end: SessionEnd::EndOfInput,
            });
        }

        let message = match std::str::from_utf8(strip_line_ending(&line)) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "Discarded input line that is not valid UTF-8");
                writeln!(
                    out,
                    "That message is not valid UTF-8 and was not sent. Please type it again."
                )?;
                continue;
            }
        };
        if is_exit(message) {
            writeln!(out, "Session terminated. Goodbye!")?;
            return Ok(SessionSummary {
                turns,
                end: SessionEnd::Exit,
            });
        }

        let outcome = gateway.handle_turn(message).await;
        if !matches!(outcome, TurnOutcome::Rejected { .. }) {
            turns += 1;
        }
        debug!(
            turn_id = %outcome.record().turn_id,
            state = ?outcome.state(),
            "Turn finished"
        );
        report::render_outcome(out, &outcome)?;
    }
}
