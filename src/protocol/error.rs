//! Protocol error types

use thiserror::Error;

/// A frame or event sequence the session cannot make sense of.
///
/// Any of these aborts the current turn. Whatever was merged before the
/// failure stays in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("stream is not valid UTF-8 near line {line}")]
    InvalidUtf8 { line: usize },

    #[error("malformed frame on line {line}: {message}")]
    MalformedFrame { line: usize, message: String },

    #[error("part index {index} skips ahead of {len} existing parts")]
    IndexGap { index: usize, len: usize },

    #[error("part index {index} already holds a {found} part, cannot apply {event}")]
    IndexConflict {
        index: usize,
        found: &'static str,
        event: &'static str,
    },

    #[error("tool call {call_id} is bound to index {bound}, event addressed index {index}")]
    CallIdConflict {
        call_id: String,
        bound: usize,
        index: usize,
    },

    #[error("tool call {call_id} was started as {existing}, event names {received}")]
    ToolNameConflict {
        call_id: String,
        existing: String,
        received: String,
    },

    #[error("tool call {call_id} arrived without a tool name")]
    MissingToolName { call_id: String },
}
