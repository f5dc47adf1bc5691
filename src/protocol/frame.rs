//! Frame shapes on the wire and the events they decode into

use crate::store::FilePart;
use serde::Deserialize;
use serde_json::Value;

/// A decoded protocol event, ready to be merged into the message store.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// A new assistant message begins
    MessageStart { message_id: Option<String> },
    /// The open assistant message is complete
    MessageEnd,
    TextDelta {
        index: usize,
        text: String,
    },
    ToolInputDelta {
        index: usize,
        call_id: String,
        tool_name: String,
        chunk: String,
    },
    ToolInputComplete {
        index: usize,
        call_id: String,
        /// Optional when the part already exists from earlier deltas
        tool_name: Option<String>,
        input: Value,
    },
    ToolOutput {
        index: usize,
        call_id: String,
        output: Value,
    },
    ToolError {
        index: usize,
        call_id: String,
        error_text: String,
    },
    File {
        index: usize,
        part: FilePart,
    },
    /// The endpoint reported a failure for the whole turn
    StreamError { reason: String },
}

impl ProtocolEvent {
    /// Wire name of the event, used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::MessageStart { .. } => "start",
            ProtocolEvent::MessageEnd => "finish",
            ProtocolEvent::TextDelta { .. } => "text-delta",
            ProtocolEvent::ToolInputDelta { .. } => "tool-input-delta",
            ProtocolEvent::ToolInputComplete { .. } => "tool-input-available",
            ProtocolEvent::ToolOutput { .. } => "tool-output-available",
            ProtocolEvent::ToolError { .. } => "tool-output-error",
            ProtocolEvent::File { .. } => "file",
            ProtocolEvent::StreamError { .. } => "error",
        }
    }

    /// Part index addressed by the event, if it targets a part
    pub fn index(&self) -> Option<usize> {
        match self {
            ProtocolEvent::TextDelta { index, .. }
            | ProtocolEvent::ToolInputDelta { index, .. }
            | ProtocolEvent::ToolInputComplete { index, .. }
            | ProtocolEvent::ToolOutput { index, .. }
            | ProtocolEvent::ToolError { index, .. }
            | ProtocolEvent::File { index, .. } => Some(*index),
            ProtocolEvent::MessageStart { .. }
            | ProtocolEvent::MessageEnd
            | ProtocolEvent::StreamError { .. } => None,
        }
    }
}

/// One JSON frame as sent by the endpoint
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(super) enum WireFrame {
    TextDelta {
        index: usize,
        delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputDelta {
        index: usize,
        tool_call_id: String,
        tool_name: String,
        #[serde(alias = "inputTextDelta")]
        input_delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        index: usize,
        tool_call_id: String,
        #[serde(default)]
        tool_name: Option<String>,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        index: usize,
        tool_call_id: String,
        output: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        index: usize,
        tool_call_id: String,
        error_text: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        index: usize,
        url: String,
        media_type: String,
        #[serde(default)]
        filename: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Start {
        #[serde(default)]
        message_id: Option<String>,
    },
    Finish,
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
    /// Frame types this engine does not track (`start-step`, metadata, ...)
    #[serde(other)]
    Unknown,
}

impl WireFrame {
    pub(super) fn into_event(self) -> Option<ProtocolEvent> {
        let event = match self {
            WireFrame::TextDelta { index, delta } => ProtocolEvent::TextDelta { index, text: delta },
            WireFrame::ToolInputDelta {
                index,
                tool_call_id,
                tool_name,
                input_delta,
            } => ProtocolEvent::ToolInputDelta {
                index,
                call_id: tool_call_id,
                tool_name,
                chunk: input_delta,
            },
            WireFrame::ToolInputAvailable {
                index,
                tool_call_id,
                tool_name,
                input,
            } => ProtocolEvent::ToolInputComplete {
                index,
                call_id: tool_call_id,
                tool_name,
                input,
            },
            WireFrame::ToolOutputAvailable {
                index,
                tool_call_id,
                output,
            } => ProtocolEvent::ToolOutput {
                index,
                call_id: tool_call_id,
                output,
            },
            WireFrame::ToolOutputError {
                index,
                tool_call_id,
                error_text,
            } => ProtocolEvent::ToolError {
                index,
                call_id: tool_call_id,
                error_text,
            },
            WireFrame::File {
                index,
                url,
                media_type,
                filename,
            } => ProtocolEvent::File {
                index,
                part: FilePart {
                    url,
                    media_type,
                    filename,
                },
            },
            WireFrame::Start { message_id } => ProtocolEvent::MessageStart { message_id },
            WireFrame::Finish => ProtocolEvent::MessageEnd,
            WireFrame::Error { error_text } => ProtocolEvent::StreamError { reason: error_text },
            WireFrame::Unknown => return None,
        };
        Some(event)
    }
}
