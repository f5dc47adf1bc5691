//! Session state machine
//!
//! Pure state transitions; the session executes the returned effects.

mod effect;
mod event;
mod state;
mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{SessionState, SessionStatus, TurnId};
pub use transition::{transition, TransitionError, TransitionResult};
