//! Ordered message list for one session
//!
//! Messages are only ever appended. At most one assistant message is open
//! (status `Streaming`) at a time, and only the open message is mutated by
//! the merger.

mod merge;
mod message;
mod tool_call;


pub use merge::{apply, MergeOutcome};
pub use message::{FilePart, Message, MessageId, MessageStatus, Part, Role, TextPart};
pub use tool_call::{
    InvalidToolTransition, ToolCallPart, ToolCallState, ToolCallStatus, ToolCallUpdate,
    ToolExecutionError,
};

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    /// Position of the open assistant message, if any
    open: Option<usize>,
    /// Bumped on every mutation
    version: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub fn open_message(&self) -> Option<&Message> {
        self.open.and_then(|i| self.messages.get(i))
    }

    /// Append a complete message (the user turn)
    pub fn push(&mut self, message: Message) {
        debug_assert!(message.status.is_frozen());
        self.messages.push(message);
        self.touch();
    }

    /// Open a new assistant message, completing any message still open
    pub fn open_assistant(&mut self, id: Option<MessageId>) -> &mut Message {
        self.freeze_open(MessageStatus::Complete);
        self.messages.push(Message::assistant(id));
        let index = self.messages.len() - 1;
        self.open = Some(index);
        self.touch();
        &mut self.messages[index]
    }

    /// The open assistant message, opening one if needed
    pub(crate) fn open_or_create(&mut self) -> &mut Message {
        match self.open {
            Some(index) if index < self.messages.len() => &mut self.messages[index],
            _ => self.open_assistant(None),
        }
    }

    /// Freeze the open message with `status`. Returns the frozen message's id.
    pub fn freeze_open(&mut self, status: MessageStatus) -> Option<MessageId> {
        debug_assert!(status.is_frozen());
        let index = self.open.take()?;
        let message = self.messages.get_mut(index)?;
        message.status = status;
        let id = message.id.clone();
        self.touch();
        Some(id)
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }
}
