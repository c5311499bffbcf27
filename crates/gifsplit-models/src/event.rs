//! Job progress events.
//!
//! One ordered event stream per job: any number of `clip_ready` events in
//! segment order, then exactly one terminal event. `keepalive` is synthesized
//! by an idle subscription and never stored.

use serde::{Deserialize, Serialize};

use crate::artifact::Clip;

/// Longest message allowed to cross the boundary.
const MAX_MESSAGE_LEN: usize = 200;

/// Per-job progress event, tagged for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// One clip is rendered, persisted, and recorded
    ClipReady { clip: Clip },

    /// All segments rendered; `total` clips exist
    Complete { total: usize },

    /// Stopped at a safe point after a cancel request
    Cancelled,

    /// Execution aborted; message is already sanitized
    Error { message: String },

    /// Idle heartbeat so a quiet stream is not mistaken for a stalled one
    Keepalive,
}

impl JobEvent {
    pub fn clip_ready(clip: Clip) -> Self {
        Self::ClipReady { clip }
    }

    pub fn complete(total: usize) -> Self {
        Self::Complete { total }
    }

    /// Build an error event, sanitizing the message on the way in.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: sanitize_message(&message.into()),
        }
    }

    /// Whether this event ends the job's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Complete { .. } | JobEvent::Cancelled | JobEvent::Error { .. }
        )
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::ClipReady { .. } => "clip_ready",
            JobEvent::Complete { .. } => "complete",
            JobEvent::Cancelled => "cancelled",
            JobEvent::Error { .. } => "error",
            JobEvent::Keepalive => "keepalive",
        }
    }
}

/// Mask path-like tokens and bound message length.
///
/// Boundary-crossing messages must not leak filesystem layout; anything
/// containing a path separator is replaced wholesale.
pub fn sanitize_message(raw: &str) -> String {
    let mut msg = raw
        .split_whitespace()
        .map(|tok| {
            if tok.contains('/') || tok.contains('\\') {
                "[path]"
            } else {
                tok
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if msg.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !msg.is_char_boundary(cut) {
            cut -= 1;
        }
        msg.truncate(cut);
    }
    msg
}
