//! Streaming chat session engine
//!
//! A [`ChatSession`] sends user turns to a remote chat endpoint, decodes the
//! streamed response frames and merges them into an ordered message history
//! that front-ends read through snapshots.

pub mod attachments;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod state_machine;
pub mod store;
pub mod tools;
pub mod transport;

pub use attachments::Attachment;
pub use config::SessionConfig;
pub use error::SessionError;
pub use session::{ChatSession, SessionSnapshot, SessionUpdate};
pub use state_machine::{SessionStatus, TurnId};
pub use store::{Message, MessageStatus, Part, Role, ToolCallPart, ToolCallStatus};
pub use transport::{HttpTransport, LoggingTransport, Transport, TransportError};
