//! Tool-call parts and their lifecycle
//!
//! ```text
//! (absent) --delta--> InputStreaming --complete--> InputAvailable
//! (absent) --complete-------------------------^        |
//!                                 output <-------------+-------------> error
//!                            OutputAvailable                       OutputError
//! ```
//!
//! Both output states are terminal.

use crate::protocol::partial_json::parse_partial;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Per-call state, with exactly the payload each state can have
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ToolCallState {
    #[serde(rename_all = "camelCase")]
    InputStreaming {
        /// Raw input text received so far
        raw_input: String,
        /// Best-effort parse of `raw_input`
        input: Option<Value>,
    },
    InputAvailable {
        input: Value,
    },
    OutputAvailable {
        input: Value,
        output: Value,
    },
    #[serde(rename_all = "camelCase")]
    OutputError {
        input: Value,
        error_text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCallStatus {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolCallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCallStatus::InputStreaming => "input-streaming",
            ToolCallStatus::InputAvailable => "input-available",
            ToolCallStatus::OutputAvailable => "output-available",
            ToolCallStatus::OutputError => "output-error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ToolCallStatus::OutputAvailable | ToolCallStatus::OutputError
        )
    }
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPart {
    pub tool_name: String,
    pub call_id: String,
    #[serde(flatten)]
    pub state: ToolCallState,
}

/// A change requested by one protocol event
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallUpdate {
    InputDelta(String),
    InputComplete(Value),
    Output(Value),
    Error(String),
}

impl ToolCallUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCallUpdate::InputDelta(_) => "tool-input-delta",
            ToolCallUpdate::InputComplete(_) => "tool-input-available",
            ToolCallUpdate::Output(_) => "tool-output-available",
            ToolCallUpdate::Error(_) => "tool-output-error",
        }
    }
}

/// An update the current state does not allow. Non-fatal: the update is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tool call {call_id} in state {from} cannot accept {update}")]
pub struct InvalidToolTransition {
    pub call_id: String,
    pub from: ToolCallStatus,
    pub update: &'static str,
}

/// A tool that ran remotely and reported failure.
///
/// This is data shown to the user, the turn itself carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tool {tool_name} ({call_id}) failed: {error_text}")]
pub struct ToolExecutionError {
    pub call_id: String,
    pub tool_name: String,
    pub error_text: String,
}

impl ToolCallPart {
    /// A part created by the first input delta
    pub fn streaming(call_id: impl Into<String>, tool_name: impl Into<String>, chunk: &str) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            state: ToolCallState::InputStreaming {
                raw_input: chunk.to_string(),
                input: parse_partial(chunk),
            },
        }
    }

    /// A part whose input arrived in one piece
    pub fn available(call_id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            state: ToolCallState::InputAvailable { input },
        }
    }

    pub fn status(&self) -> ToolCallStatus {
        match &self.state {
            ToolCallState::InputStreaming { .. } => ToolCallStatus::InputStreaming,
            ToolCallState::InputAvailable { .. } => ToolCallStatus::InputAvailable,
            ToolCallState::OutputAvailable { .. } => ToolCallStatus::OutputAvailable,
            ToolCallState::OutputError { .. } => ToolCallStatus::OutputError,
        }
    }

    /// Input so far; partial while streaming
    pub fn input(&self) -> Option<&Value> {
        match &self.state {
            ToolCallState::InputStreaming { input, .. } => input.as_ref(),
            ToolCallState::InputAvailable { input }
            | ToolCallState::OutputAvailable { input, .. }
            | ToolCallState::OutputError { input, .. } => Some(input),
        }
    }

    pub fn output(&self) -> Option<&Value> {
        match &self.state {
            ToolCallState::OutputAvailable { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match &self.state {
            ToolCallState::OutputError { error_text, .. } => Some(error_text),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn execution_error(&self) -> Option<ToolExecutionError> {
        self.error_text().map(|error_text| ToolExecutionError {
            call_id: self.call_id.clone(),
            tool_name: self.tool_name.clone(),
            error_text: error_text.to_string(),
        })
    }

    /// Apply one update. On error the part is left untouched.
    pub fn apply(&mut self, update: ToolCallUpdate) -> Result<(), InvalidToolTransition> {
        let from = self.status();
        let update_name = update.name();
        let current = std::mem::replace(
            &mut self.state,
            ToolCallState::InputAvailable { input: Value::Null },
        );

        let next = match (current, update) {
            (
                ToolCallState::InputStreaming { mut raw_input, .. },
                ToolCallUpdate::InputDelta(chunk),
            ) => {
                raw_input.push_str(&chunk);
                let input = parse_partial(&raw_input);
                ToolCallState::InputStreaming { raw_input, input }
            }
            (ToolCallState::InputStreaming { .. }, ToolCallUpdate::InputComplete(input)) => {
                ToolCallState::InputAvailable { input }
            }
            (ToolCallState::InputAvailable { input }, ToolCallUpdate::Output(output)) => {
                ToolCallState::OutputAvailable { input, output }
            }
            (ToolCallState::InputAvailable { input }, ToolCallUpdate::Error(error_text)) => {
                ToolCallState::OutputError { input, error_text }
            }
            (current, _) => {
                self.state = current;
                return Err(InvalidToolTransition {
                    call_id: self.call_id.clone(),
                    from,
                    update: update_name,
                });
            }
        };

        self.state = next;
        Ok(())
    }
}
