//! Pure state transition function
//!
//! ```text
//! Ready ──submit──> Submitted ──activity──> Streaming ──finished──> Ready
//!   ^                  │    │                  │   │
//!   │                  │    └──────stop────────┼───┴──> Ready
//!   └──submit── Error <┴──────failed───────────┘
//! ```

use super::{Effect, Event, SessionState, SessionStatus, TurnId};
use crate::store::MessageStatus;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },
    #[error("event for turn {turn} arrived, current turn is {current:?}")]
    StaleTurn {
        turn: TurnId,
        current: Option<TurnId>,
    },
}

/// Pure transition function: no I/O, same inputs give the same outputs.
pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User submit
        // ============================================================

        // Ready/Error + Submit -> Submitted (a new submit clears the error)
        (SessionState::Ready | SessionState::Error { .. }, Event::Submit { turn, message }) => {
            Ok(TransitionResult::new(SessionState::Submitted { turn })
                .with_effect(Effect::append(message))
                .with_effect(Effect::OpenTransport { turn })
                .with_effect(Effect::notify(SessionStatus::Submitted)))
        }

        // Busy + Submit -> reject
        (SessionState::Submitted { .. } | SessionState::Streaming { .. }, Event::Submit { .. }) => {
            Err(TransitionError::InvalidState {
                operation: "submit",
                status: state.status(),
            })
        }

        // ============================================================
        // User stop
        // ============================================================
        (SessionState::Submitted { turn } | SessionState::Streaming { turn }, Event::Stop) => {
            Ok(TransitionResult::new(SessionState::Ready)
                .with_effect(Effect::AbortTransport { turn: *turn })
                .with_effect(Effect::freeze(MessageStatus::Stopped))
                .with_effect(Effect::notify(SessionStatus::Ready)))
        }

        (SessionState::Ready | SessionState::Error { .. }, Event::Stop) => {
            Err(TransitionError::InvalidState {
                operation: "stop",
                status: state.status(),
            })
        }

        // ============================================================
        // Stream progress; only for the turn in flight
        // ============================================================
        (_, event) if event.turn() != state.turn() => Err(TransitionError::StaleTurn {
            // Submit was matched above, so every remaining event has a turn
            turn: event.turn().unwrap_or_default(),
            current: state.turn(),
        }),

        (SessionState::Submitted { turn }, Event::StreamActivity { .. }) => {
            Ok(TransitionResult::new(SessionState::Streaming { turn: *turn })
                .with_effect(Effect::notify(SessionStatus::Streaming)))
        }

        (SessionState::Streaming { turn }, Event::StreamActivity { .. }) => {
            Ok(TransitionResult::new(SessionState::Streaming { turn: *turn }))
        }

        (SessionState::Submitted { .. } | SessionState::Streaming { .. }, Event::StreamFinished { .. }) => {
            Ok(TransitionResult::new(SessionState::Ready)
                .with_effect(Effect::freeze(MessageStatus::Complete))
                .with_effect(Effect::notify(SessionStatus::Ready)))
        }

        (SessionState::Submitted { .. } | SessionState::Streaming { .. }, Event::StreamFailed { error, .. }) => {
            Ok(TransitionResult::new(SessionState::Error { error })
                .with_effect(Effect::freeze(MessageStatus::Failed))
                .with_effect(Effect::notify(SessionStatus::Error)))
        }

        // Ready/Error have no turn, so every pump event was caught as stale above
        (SessionState::Ready | SessionState::Error { .. }, event) => Err(TransitionError::StaleTurn {
            turn: event.turn().unwrap_or_default(),
            current: None,
        }),
    }
}
