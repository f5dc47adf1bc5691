//! Typed views of tool-call parts
//!
//! Tools run on the remote side; the session only tracks their parts. Known
//! tools get typed inputs and outputs so front-ends can render them, anything
//! else stays raw JSON.

pub mod weather;

use crate::store::{ToolCallPart, ToolCallState};
use serde_json::Value;
pub use weather::{WeatherInput, WeatherReport};

pub const GET_WEATHER: &str = "getWeather";

/// Strongly typed tool input
#[derive(Debug, Clone, PartialEq)]
pub enum KnownTool {
    GetWeather(WeatherInput),
    /// Fallback for unknown tools or inputs that do not parse
    Unknown { name: String, input: Value },
}

impl KnownTool {
    pub fn tool_name(&self) -> &str {
        match self {
            KnownTool::GetWeather(_) => GET_WEATHER,
            KnownTool::Unknown { name, .. } => name,
        }
    }

    /// Parse from tool name and JSON value
    pub fn from_name_and_value(name: &str, value: Value) -> Self {
        match name {
            GET_WEATHER => serde_json::from_value(value.clone()).map_or_else(
                |_| KnownTool::Unknown {
                    name: name.to_string(),
                    input: value,
                },
                KnownTool::GetWeather,
            ),
            _ => KnownTool::Unknown {
                name: name.to_string(),
                input: value,
            },
        }
    }

    /// Typed input of a part, once its input is complete
    pub fn from_part(part: &ToolCallPart) -> Option<Self> {
        match &part.state {
            ToolCallState::InputStreaming { .. } => None,
            ToolCallState::InputAvailable { input }
            | ToolCallState::OutputAvailable { input, .. }
            | ToolCallState::OutputError { input, .. } => {
                Some(Self::from_name_and_value(&part.tool_name, input.clone()))
            }
        }
    }
}

/// One-line, human readable state of a tool call
pub fn summarize(part: &ToolCallPart) -> String {
    if part.tool_name == GET_WEATHER {
        return weather::summarize(part);
    }
    match &part.state {
        ToolCallState::InputStreaming { .. } => format!("{}: preparing input...", part.tool_name),
        ToolCallState::InputAvailable { input } => format!("{}: running with {input}", part.tool_name),
        ToolCallState::OutputAvailable { output, .. } => format!("{}: {output}", part.tool_name),
        ToolCallState::OutputError { error_text, .. } => {
            format!("{}: error: {error_text}", part.tool_name)
        }
    }
}
