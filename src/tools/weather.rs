//! `getWeather` input and output

use crate::store::{ToolCallPart, ToolCallState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherInput {
    pub city: String,
}

/// Weather report returned by the remote tool. Fields beyond the three
/// rendered ones are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature: f64,
    pub condition: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WeatherReport {
    pub fn from_output(output: &Value) -> Option<Self> {
        serde_json::from_value(output.clone()).ok()
    }
}

pub(super) fn summarize(part: &ToolCallPart) -> String {
    match &part.state {
        ToolCallState::InputStreaming { input, .. } => {
            let city = input.as_ref().and_then(|v| v.get("city")).and_then(Value::as_str);
            match city {
                Some(city) => format!("Receiving weather request... ({city})"),
                None => "Receiving weather request...".to_string(),
            }
        }
        ToolCallState::InputAvailable { input } => {
            let city = input.get("city").and_then(Value::as_str).unwrap_or("?");
            format!("Getting weather for {city}...")
        }
        ToolCallState::OutputAvailable { output, .. } => match WeatherReport::from_output(output) {
            Some(report) => format!(
                "Weather in {}: {}°, {}",
                report.location, report.temperature, report.condition
            ),
            None => format!("Weather: {output}"),
        },
        ToolCallState::OutputError { error_text, .. } => format!("Error: {error_text}"),
    }
}
