//! Stream events carried as SSE `data:` payloads.

use crate::escape::{decode_payload, escape_line_breaks};

/// Opens the reasoning phase. Always the first event of a turn.
pub const THINK_OPEN: &str = "<think>";
/// Closes the reasoning phase; everything after it is answer content.
pub const THINK_CLOSE: &str = "</think>";
/// Terminal marker for a successful turn.
pub const DONE_MARKER: &str = "[DONE]";
/// Prefix of the terminal error payload, `[ERROR] <reason>`.
pub const ERROR_PREFIX: &str = "[ERROR]";

/// One event of a relayed turn.
///
/// Ordering within a turn: `ReasoningOpen`, reasoning `Content`*,
/// `ReasoningClose`, answer `Content`*, then exactly one of `Done` / `Error`.
/// An `Error` may cut the sequence short at any point after `ReasoningOpen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ReasoningOpen,
    ReasoningClose,
    /// Decoded text belonging to whichever phase is current.
    Content(String),
    Done,
    /// Upstream failed after streaming started.
    Error(String),
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        StreamEvent::Content(text.into())
    }

    /// `true` for the events that end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }

    /// Encode as a single-line SSE payload.
    ///
    /// Content that would read back as a reserved marker gets its first
    /// character percent-encoded; [`decode_payload`] restores it.
    pub fn to_payload(&self) -> String {
        match self {
            StreamEvent::ReasoningOpen => THINK_OPEN.to_owned(),
            StreamEvent::ReasoningClose => THINK_CLOSE.to_owned(),
            StreamEvent::Done => DONE_MARKER.to_owned(),
            StreamEvent::Content(text) => guard_reserved(escape_line_breaks(text).into_owned()),
            StreamEvent::Error(reason) => {
                format!("{ERROR_PREFIX} {}", escape_line_breaks(reason))
            }
        }
    }

    /// Classify a raw payload. Marker comparison is exact and happens before
    /// any decoding.
    pub fn from_payload(raw: &str) -> Self {
        match raw {
            THINK_OPEN => StreamEvent::ReasoningOpen,
            THINK_CLOSE => StreamEvent::ReasoningClose,
            DONE_MARKER => StreamEvent::Done,
            _ => match raw.strip_prefix(ERROR_PREFIX) {
                Some(reason) => {
                    let reason = reason.strip_prefix(' ').unwrap_or(reason);
                    StreamEvent::Error(decode_payload(reason))
                }
                None => StreamEvent::Content(decode_payload(raw)),
            },
        }
    }
}

fn is_reserved(payload: &str) -> bool {
    matches!(payload, THINK_OPEN | THINK_CLOSE | DONE_MARKER) || payload.starts_with(ERROR_PREFIX)
}

fn guard_reserved(payload: String) -> String {
    if !is_reserved(&payload) {
        return payload;
    }
    // Every reserved payload starts with an ASCII `<` or `[`.
    format!("%{:02X}{}", payload.as_bytes()[0], &payload[1..])
}

// ── Tests ──────────────────────────────────────────────────────────────────────
