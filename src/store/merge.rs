//! Merging protocol events into the store
//!
//! `index` decides where a part lives, `call_id` decides which tool call it
//! is. Conflicts between the two are fatal for the turn. Tool updates that
//! the call's current state does not allow are dropped and logged.

use super::message::{Message, Part, TextPart};
use super::tool_call::{ToolCallPart, ToolCallUpdate};
use super::{MessageStatus, MessageStore};
use crate::protocol::{ProtocolError, ProtocolEvent};

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// Ignored without mutating anything
    Dropped { reason: String },
}

impl MergeOutcome {
    fn dropped(reason: impl Into<String>) -> Self {
        MergeOutcome::Dropped {
            reason: reason.into(),
        }
    }
}

/// Apply one event to the store.
///
/// # Errors
///
/// Returns a [`ProtocolError`] when the event's index or call id contradicts
/// what is already in the open message. Parts merged earlier are left as
/// they were.
pub fn apply(store: &mut MessageStore, event: ProtocolEvent) -> Result<MergeOutcome, ProtocolError> {
    let kind = event.kind();
    let outcome = match event {
        ProtocolEvent::MessageStart { message_id } => {
            let message_id = message_id.filter(|id| {
                let taken = store.contains(id);
                if taken {
                    tracing::warn!(message_id = %id, "Duplicate message id, assigning a fresh one");
                }
                !taken
            });
            store.open_assistant(message_id);
            return Ok(MergeOutcome::Applied);
        }
        ProtocolEvent::MessageEnd => {
            return Ok(match store.freeze_open(MessageStatus::Complete) {
                Some(_) => MergeOutcome::Applied,
                None => MergeOutcome::dropped("finish without an open message"),
            });
        }
        ProtocolEvent::StreamError { .. } => {
            MergeOutcome::dropped("stream errors end the turn, they are not merged")
        }
        ProtocolEvent::TextDelta { index, text } => {
            let message = store.open_or_create();
            merge_text(message, index, text)?
        }
        ProtocolEvent::File { index, part } => {
            let message = store.open_or_create();
            match slot(message, index, kind)? {
                Slot::Next => {
                    message.parts.push(Part::File(part));
                    MergeOutcome::Applied
                }
                Slot::Existing(found) => {
                    return Err(ProtocolError::IndexConflict {
                        index,
                        found: found.kind(),
                        event: kind,
                    })
                }
            }
        }
        ProtocolEvent::ToolInputDelta {
            index,
            call_id,
            tool_name,
            chunk,
        } => {
            let message = store.open_or_create();
            match locate_tool(message, index, &call_id, kind)? {
                ToolSlot::Next => {
                    message
                        .parts
                        .push(Part::ToolCall(ToolCallPart::streaming(call_id, tool_name, &chunk)));
                    MergeOutcome::Applied
                }
                ToolSlot::Existing(part) => {
                    check_tool_name(part, &tool_name)?;
                    update_tool(part, index, ToolCallUpdate::InputDelta(chunk))
                }
            }
        }
        ProtocolEvent::ToolInputComplete {
            index,
            call_id,
            tool_name,
            input,
        } => {
            let message = store.open_or_create();
            match locate_tool(message, index, &call_id, kind)? {
                ToolSlot::Next => {
                    let tool_name = tool_name.ok_or_else(|| ProtocolError::MissingToolName {
                        call_id: call_id.clone(),
                    })?;
                    message
                        .parts
                        .push(Part::ToolCall(ToolCallPart::available(call_id, tool_name, input)));
                    MergeOutcome::Applied
                }
                ToolSlot::Existing(part) => {
                    if let Some(tool_name) = &tool_name {
                        check_tool_name(part, tool_name)?;
                    }
                    update_tool(part, index, ToolCallUpdate::InputComplete(input))
                }
            }
        }
        ProtocolEvent::ToolOutput {
            index,
            call_id,
            output,
        } => merge_tool_result(store, index, &call_id, ToolCallUpdate::Output(output))?,
        ProtocolEvent::ToolError {
            index,
            call_id,
            error_text,
        } => merge_tool_result(store, index, &call_id, ToolCallUpdate::Error(error_text))?,
    };

    match &outcome {
        MergeOutcome::Applied => store.touch(),
        MergeOutcome::Dropped { reason } => {
            tracing::warn!(event = kind, %reason, "Dropping protocol event");
        }
    }
    Ok(outcome)
}

fn merge_text(message: &mut Message, index: usize, text: String) -> Result<MergeOutcome, ProtocolError> {
    match slot(message, index, "text-delta")? {
        Slot::Next => {
            message.parts.push(Part::Text(TextPart { text }));
            Ok(MergeOutcome::Applied)
        }
        Slot::Existing(Part::Text(part)) => {
            part.text.push_str(&text);
            Ok(MergeOutcome::Applied)
        }
        Slot::Existing(found) => Err(ProtocolError::IndexConflict {
            index,
            found: found.kind(),
            event: "text-delta",
        }),
    }
}

/// Output and error only ever target an existing call
fn merge_tool_result(
    store: &mut MessageStore,
    index: usize,
    call_id: &str,
    update: ToolCallUpdate,
) -> Result<MergeOutcome, ProtocolError> {
    let event = update.name();
    let Some(message) = store.open.and_then(|i| store.messages.get_mut(i)) else {
        return Ok(MergeOutcome::dropped(format!(
            "{event} for {call_id} without an open message"
        )));
    };
    if position_of_call(message, call_id).is_none() {
        return Ok(MergeOutcome::dropped(format!("{event} for unknown call {call_id}")));
    }
    match locate_tool(message, index, call_id, event)? {
        ToolSlot::Existing(part) => Ok(update_tool(part, index, update)),
        // Unreachable: the call is bound, so it is not the next free slot
        ToolSlot::Next => Ok(MergeOutcome::dropped(format!("{event} for unknown call {call_id}"))),
    }
}

fn update_tool(part: &mut ToolCallPart, index: usize, update: ToolCallUpdate) -> MergeOutcome {
    match part.apply(update) {
        Ok(()) => MergeOutcome::Applied,
        Err(e) => {
            tracing::debug!(index, call_id = %part.call_id, "Invalid tool transition");
            MergeOutcome::dropped(e.to_string())
        }
    }
}

fn check_tool_name(part: &ToolCallPart, received: &str) -> Result<(), ProtocolError> {
    if part.tool_name == received {
        Ok(())
    } else {
        Err(ProtocolError::ToolNameConflict {
            call_id: part.call_id.clone(),
            existing: part.tool_name.clone(),
            received: received.to_string(),
        })
    }
}

// ============================================================================
// Addressing
// ============================================================================

enum Slot<'a> {
    /// `index` is the next free position
    Next,
    Existing(&'a mut Part),
}

fn slot<'a>(message: &'a mut Message, index: usize, event: &'static str) -> Result<Slot<'a>, ProtocolError> {
    let len = message.parts.len();
    if index > len {
        tracing::debug!(index, len, event, "Part index gap");
        return Err(ProtocolError::IndexGap { index, len });
    }
    Ok(match message.parts.get_mut(index) {
        Some(part) => Slot::Existing(part),
        None => Slot::Next,
    })
}

enum ToolSlot<'a> {
    Next,
    Existing(&'a mut ToolCallPart),
}

fn position_of_call(message: &Message, call_id: &str) -> Option<usize> {
    message
        .parts
        .iter()
        .position(|p| p.as_tool_call().is_some_and(|c| c.call_id == call_id))
}

fn locate_tool<'a>(
    message: &'a mut Message,
    index: usize,
    call_id: &str,
    event: &'static str,
) -> Result<ToolSlot<'a>, ProtocolError> {
    if let Some(bound) = position_of_call(message, call_id) {
        if bound != index {
            return Err(ProtocolError::CallIdConflict {
                call_id: call_id.to_string(),
                bound,
                index,
            });
        }
    }
    match slot(message, index, event)? {
        Slot::Next => Ok(ToolSlot::Next),
        Slot::Existing(Part::ToolCall(part)) => {
            if part.call_id == call_id {
                Ok(ToolSlot::Existing(part))
            } else {
                Err(ProtocolError::IndexConflict {
                    index,
                    found: "tool-call",
                    event,
                })
            }
        }
        Slot::Existing(found) => Err(ProtocolError::IndexConflict {
            index,
            found: found.kind(),
            event,
        }),
    }
}
