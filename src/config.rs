//! Session configuration

use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/api-tools";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Configuration for a session and its HTTP transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Assistant endpoint the turn request is POSTed to
    pub endpoint: String,
    /// Connect timeout only; a streaming response may run as long as it likes
    pub connect_timeout: Duration,
    pub max_attachment_bytes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            endpoint: lookup("CHAT_ENDPOINT")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.endpoint),
            connect_timeout: parse_number(&lookup, "CHAT_CONNECT_TIMEOUT_SECS")
                .map_or(defaults.connect_timeout, Duration::from_secs),
            max_attachment_bytes: parse_number(&lookup, "CHAT_MAX_ATTACHMENT_BYTES")
                .unwrap_or(defaults.max_attachment_bytes),
        }
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable config value");
            None
        }
    }
}
