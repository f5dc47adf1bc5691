//! Outbound request body

use crate::attachments::Attachment;
use crate::store::Message;
use serde::Serialize;

/// Body POSTed to the endpoint for one turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Session id, stable across turns
    pub id: String,
    pub message_text: String,
    pub attachments: Vec<WireAttachment>,
    /// Full history, including the user message of this turn
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAttachment {
    pub media_type: String,
    pub filename: String,
    /// `data:` URL carrying the file content
    pub url: String,
}

impl From<&Attachment> for WireAttachment {
    fn from(attachment: &Attachment) -> Self {
        Self {
            media_type: attachment.media_type.clone(),
            filename: attachment.filename.clone(),
            url: attachment.data_url(),
        }
    }
}

impl ChatRequest {
    pub fn new(
        session_id: impl Into<String>,
        message_text: impl Into<String>,
        attachments: &[Attachment],
        messages: Vec<Message>,
    ) -> Self {
        Self {
            id: session_id.into(),
            message_text: message_text.into(),
            attachments: attachments.iter().map(WireAttachment::from).collect(),
            messages,
        }
    }
}
