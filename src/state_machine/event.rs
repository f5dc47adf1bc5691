//! Events that drive the session state machine

use super::state::TurnId;
use crate::error::SessionError;
use crate::store::Message;

#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        turn: TurnId,
        message: Message,
    },
    Stop,

    // Pump events, tagged with the turn that produced them
    /// At least one event of the turn was decoded
    StreamActivity {
        turn: TurnId,
    },
    /// The transport reported end of stream
    StreamFinished {
        turn: TurnId,
    },
    StreamFailed {
        turn: TurnId,
        error: SessionError,
    },
}

impl Event {
    pub fn turn(&self) -> Option<TurnId> {
        match self {
            Event::Submit { turn, .. }
            | Event::StreamActivity { turn }
            | Event::StreamFinished { turn }
            | Event::StreamFailed { turn, .. } => Some(*turn),
            Event::Stop => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Submit { .. } => "submit",
            Event::Stop => "stop",
            Event::StreamActivity { .. } => "stream_activity",
            Event::StreamFinished { .. } => "stream_finished",
            Event::StreamFailed { .. } => "stream_failed",
        }
    }
}
