//! Message and part types

use super::tool_call::ToolCallPart;
use crate::attachments::Attachment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Lifecycle of a message. Only `Streaming` messages accept merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Streaming,
    Complete,
    /// Frozen by the user stopping the turn
    Stopped,
    /// Frozen by a turn failure, content kept as merged so far
    Failed,
}

impl MessageStatus {
    pub fn is_frozen(self) -> bool {
        !matches!(self, MessageStatus::Streaming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Streaming => "streaming",
            MessageStatus::Complete => "complete",
            MessageStatus::Stopped => "stopped",
            MessageStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    pub url: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// One ordered piece of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text(TextPart),
    ToolCall(ToolCallPart),
    File(FilePart),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(TextPart { text: text.into() })
    }

    /// Wire name of the part kind
    pub fn kind(&self) -> &'static str {
        match self {
            Part::Text(_) => "text",
            Part::ToolCall(_) => "tool-call",
            Part::File(_) => "file",
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallPart> {
        match self {
            Part::ToolCall(call) => Some(call),
            Part::Text(_) | Part::File(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub parts: Vec<Part>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A complete user message: the text, then one file part per attachment
    pub fn user(text: &str, attachments: &[Attachment]) -> Self {
        let mut parts = Vec::with_capacity(attachments.len() + 1);
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        parts.extend(attachments.iter().map(|a| Part::File(a.to_file_part())));

        Self {
            id: new_message_id(),
            role: Role::User,
            parts,
            status: MessageStatus::Complete,
            created_at: Utc::now(),
        }
    }

    /// An empty, open assistant message
    pub fn assistant(id: Option<MessageId>) -> Self {
        Self {
            id: id.unwrap_or_else(new_message_id),
            role: Role::Assistant,
            parts: Vec::new(),
            status: MessageStatus::Streaming,
            created_at: Utc::now(),
        }
    }

    /// All text parts concatenated
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(t) => Some(t.text.as_str()),
                Part::ToolCall(_) | Part::File(_) => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallPart> {
        self.parts.iter().filter_map(Part::as_tool_call)
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_frozen()
    }
}

fn new_message_id() -> MessageId {
    uuid::Uuid::new_v4().to_string()
}
