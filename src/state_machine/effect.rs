//! Effects produced by state transitions

use super::state::{SessionStatus, TurnId};
use crate::store::{Message, MessageStatus};

/// Effects to be executed by the session after a transition, in order
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append a complete message to the store
    AppendMessage { message: Message },

    /// Send the turn's request and start pumping its response
    OpenTransport { turn: TurnId },

    /// Cancel the turn's request
    AbortTransport { turn: TurnId },

    /// Freeze the open assistant message, if there is one
    FreezeOpenMessage { status: MessageStatus },

    /// Publish the new status to observers
    NotifyStatus { status: SessionStatus },
}

impl Effect {
    pub fn append(message: Message) -> Self {
        Effect::AppendMessage { message }
    }

    pub fn freeze(status: MessageStatus) -> Self {
        Effect::FreezeOpenMessage { status }
    }

    pub fn notify(status: SessionStatus) -> Self {
        Effect::NotifyStatus { status }
    }
}
