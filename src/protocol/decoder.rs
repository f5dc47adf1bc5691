//! Streaming frame decoder
//!
//! Transport chunks arrive with arbitrary boundaries: one chunk may carry
//! several frames, and one frame (or one multi-byte character) may straddle
//! two chunks. The decoder buffers raw bytes and only decodes complete lines.

use super::error::ProtocolError;
use super::frame::{ProtocolEvent, WireFrame};

/// SSE field names that carry no payload for us
const IGNORED_SSE_FIELDS: &[&str] = &["event:", "id:", "retry:"];

/// SSE stream terminator used by most endpoints
const DONE_MARKER: &str = "[DONE]";

/// Events decoded from one chunk, plus the error that stopped decoding
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodeBatch {
    pub events: Vec<ProtocolEvent>,
    pub error: Option<ProtocolError>,
}

impl DecodeBatch {
    pub fn into_result(self) -> Result<Vec<ProtocolEvent>, ProtocolError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.events),
        }
    }
}

impl From<Result<Vec<ProtocolEvent>, ProtocolError>> for DecodeBatch {
    fn from(result: Result<Vec<ProtocolEvent>, ProtocolError>) -> Self {
        match result {
            Ok(events) => Self { events, error: None },
            Err(e) => Self {
                events: Vec::new(),
                error: Some(e),
            },
        }
    }
}

/// Incremental decoder for one turn's response stream
#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<u8>,
    /// Number of lines consumed so far (1-based line of the last decoded frame)
    line: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk, returning every event completed by it.
    ///
    /// # Errors
    ///
    /// Fails on the first line that is not valid UTF-8 or not a valid frame,
    /// discarding events decoded before it. Use [`Decoder::feed`] to keep them.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<ProtocolEvent>, ProtocolError> {
        self.feed(chunk).into_result()
    }

    /// Feed one raw chunk. Decoding stops at the first bad line; the events
    /// before it are returned alongside the error, in arrival order.
    ///
    /// The decoder should not be used after an error.
    pub fn feed(&mut self, chunk: &[u8]) -> DecodeBatch {
        self.buffer.extend_from_slice(chunk);

        let mut batch = DecodeBatch::default();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.line += 1;
            match self.decode_line(&line) {
                Ok(Some(event)) => batch.events.push(event),
                Ok(None) => {}
                Err(e) => {
                    batch.error = Some(e);
                    break;
                }
            }
        }
        batch
    }

    /// Flush a trailing line that was never newline-terminated.
    ///
    /// # Errors
    ///
    /// Fails if the leftover bytes are not a complete, valid frame.
    pub fn finish(&mut self) -> Result<Vec<ProtocolEvent>, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let line = std::mem::take(&mut self.buffer);
        self.line += 1;
        Ok(self.decode_line(&line)?.into_iter().collect())
    }

    /// Bytes received but not yet decoded
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn decode_line(&self, raw: &[u8]) -> Result<Option<ProtocolEvent>, ProtocolError> {
        let text =
            std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8 { line: self.line })?;
        let text = text.trim();

        // Blank lines separate SSE events, `:` lines are SSE comments/keep-alives
        if text.is_empty() || text.starts_with(':') {
            return Ok(None);
        }

        let payload = if let Some(data) = text.strip_prefix("data:") {
            data.trim_start()
        } else if IGNORED_SSE_FIELDS.iter().any(|field| text.starts_with(field)) {
            return Ok(None);
        } else {
            text
        };

        if payload.is_empty() {
            return Ok(None);
        }
        if payload == DONE_MARKER {
            tracing::debug!(line = self.line, "Received stream terminator");
            return Ok(None);
        }

        let frame: WireFrame =
            serde_json::from_str(payload).map_err(|e| ProtocolError::MalformedFrame {
                line: self.line,
                message: e.to_string(),
            })?;

        let event = frame.into_event();
        match &event {
            Some(event) => tracing::trace!(line = self.line, kind = event.kind(), "Decoded frame"),
            None => tracing::debug!(line = self.line, "Skipping untracked frame type"),
        }
        Ok(event)
    }
}
