//! Session-level errors

use crate::protocol::ProtocolError;
use crate::state_machine::SessionStatus;
use crate::transport::TransportError;
use thiserror::Error;

pub use crate::attachments::AttachmentError;
pub use crate::store::ToolExecutionError;

/// Why a turn failed, or why a call was refused.
///
/// `Transport`, `Protocol` and `Remote` end a turn and are kept as the
/// session's last error. `InvalidState` is only ever returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The endpoint sent an `error` frame
    #[error("assistant reported an error: {reason}")]
    Remote { reason: String },

    #[error("cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },
}

impl SessionError {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Transport(e) => e.kind.as_str(),
            SessionError::Protocol(_) => "protocol",
            SessionError::Remote { .. } => "remote",
            SessionError::InvalidState { .. } => "invalid_state",
        }
    }
}
