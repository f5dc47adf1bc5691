//! Session state types

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one submit/stream cycle. Events carry the turn they belong to
/// so that anything arriving after the turn ended can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TurnId(u64);

impl TurnId {
    pub fn first() -> Self {
        TurnId(1)
    }

    #[must_use]
    pub fn next(self) -> Self {
        TurnId(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The status signal shown to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Idle, input enabled
    Ready,
    /// Request sent, nothing received yet
    Submitted,
    /// Receiving events
    Streaming,
    /// Last turn failed; a new submit is allowed
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Ready => "ready",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Error => "error",
        }
    }

    /// Submitted or streaming
    pub fn is_loading(self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::Streaming)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Ready,
    Submitted {
        turn: TurnId,
    },
    Streaming {
        turn: TurnId,
    },
    Error {
        error: SessionError,
    },
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Ready => SessionStatus::Ready,
            SessionState::Submitted { .. } => SessionStatus::Submitted,
            SessionState::Streaming { .. } => SessionStatus::Streaming,
            SessionState::Error { .. } => SessionStatus::Error,
        }
    }

    /// The turn in flight, if any
    pub fn turn(&self) -> Option<TurnId> {
        match self {
            SessionState::Submitted { turn } | SessionState::Streaming { turn } => Some(*turn),
            SessionState::Ready | SessionState::Error { .. } => None,
        }
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        match self {
            SessionState::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status().is_loading()
    }
}
