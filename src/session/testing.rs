//! Mock transports for testing
//!
//! These mocks drive a real [`ChatSession`] without any network I/O.

use super::{ChatSession, SessionSnapshot};
use crate::protocol::ChatRequest;
use crate::transport::{EventSource, Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

type Chunk = Result<Bytes, TransportError>;

// ============================================================================
// Channel Transport
// ============================================================================

/// Transport whose response bodies are fed by the test, chunk by chunk
#[derive(Default)]
pub struct ChannelTransport {
    turns: Mutex<VecDeque<Result<mpsc::UnboundedReceiver<Chunk>, TransportError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<ChatRequest>>,
    /// Cancellation tokens handed to `open`, in order
    pub tokens: Mutex<Vec<CancellationToken>>,
}

/// Test side of one response body. Dropping it ends the body.
pub struct TurnFeed {
    tx: mpsc::UnboundedSender<Chunk>,
}

impl TurnFeed {
    /// Send one frame as an NDJSON line
    pub fn frame(&self, frame: &Value) -> &Self {
        self.raw(&format!("{frame}\n"))
    }

    /// Send raw bytes; the receiver may already be gone after a stop
    pub fn raw(&self, text: &str) -> &Self {
        let _ = self.tx.send(Ok(Bytes::from(text.to_string())));
        self
    }

    /// Break the body off with a transport error
    pub fn fail(self, error: TransportError) {
        let _ = self.tx.send(Err(error));
    }

    /// End the body normally
    pub fn end(self) {}
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response body for the next `open`
    pub fn expect_turn(&self) -> TurnFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.turns.lock().unwrap().push_back(Ok(rx));
        TurnFeed { tx }
    }

    /// Make the next `open` fail
    pub fn expect_open_error(&self, error: TransportError) {
        self.turns.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn token(&self, n: usize) -> CancellationToken {
        self.tokens.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventSource, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.tokens.lock().unwrap().push(cancel.clone());
        let rx = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock turn queued")))?;
        Ok(EventSource::new(UnboundedReceiverStream::new(rx), cancel))
    }

    fn endpoint(&self) -> &str {
        "mock://channel"
    }
}

// ============================================================================
// Scripted Transport
// ============================================================================

/// Transport that replays whole response bodies, one per `open`
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<Chunk>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a body delivered as the given chunks
    pub fn with_body<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let body = chunks
            .into_iter()
            .map(|c| Ok(Bytes::from(c.into())))
            .collect();
        self.scripts.lock().unwrap().push_back(body);
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(
        &self,
        _request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventSource, TransportError> {
        let body = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::network("No script queued"))?;
        Ok(EventSource::new(futures::stream::iter(body), cancel))
    }

    fn endpoint(&self) -> &str {
        "mock://scripted"
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Poll until `predicate` holds for the session snapshot
pub async fn wait_for<T, F>(session: &ChatSession<T>, timeout: Duration, predicate: F) -> SessionSnapshot
where
    T: Transport + 'static,
    F: Fn(&SessionSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshot = session.snapshot();
        if predicate(&snapshot) {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached, last snapshot: {snapshot:#?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::Attachment;
    use crate::error::SessionError;
    use crate::protocol::ProtocolError;
    use crate::session::SessionUpdate;
    use crate::state_machine::SessionStatus;
    use crate::store::{MessageStatus, Part, Role, ToolCallStatus};
    use crate::tools::{KnownTool, WeatherReport};
    use crate::transport::TransportErrorKind;
    use serde_json::json;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(2);

    fn session() -> (ChatSession<Arc<ChannelTransport>>, Arc<ChannelTransport>) {
        let transport = Arc::new(ChannelTransport::new());
        (ChatSession::new(Arc::clone(&transport)), transport)
    }

    fn assistant_text(snapshot: &SessionSnapshot) -> String {
        snapshot
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(crate::store::Message::text)
            .collect()
    }

    #[tokio::test]
    async fn test_weather_success_scenario() {
        let (session, transport) = session();
        let feed = transport.expect_turn();

        session.submit("What's the weather in Paris?", &[]).unwrap();
        assert_eq!(session.status(), SessionStatus::Submitted);
        assert!(session.is_loading());

        feed.frame(&json!({"type": "start", "messageId": "msg-1"}))
            .frame(&json!({"type": "tool-input-delta", "index": 0, "toolCallId": "call-1", "toolName": "getWeather", "inputDelta": "{\"city\":\"Pa"}));

        let snapshot = wait_for(&session, WAIT, |s| {
            s.messages.get(1).and_then(|m| m.parts.first()).is_some()
        })
        .await;
        assert_eq!(snapshot.status, SessionStatus::Streaming);
        let call = snapshot.messages[1].parts[0].as_tool_call().unwrap();
        assert_eq!(call.status(), ToolCallStatus::InputStreaming);
        assert_eq!(call.input(), Some(&json!({"city": "Pa"})));

        feed.frame(&json!({"type": "tool-input-delta", "index": 0, "toolCallId": "call-1", "toolName": "getWeather", "inputDelta": "ris\"}"}))
            .frame(&json!({"type": "tool-input-available", "index": 0, "toolCallId": "call-1", "toolName": "getWeather", "input": {"city": "Paris"}}))
            .frame(&json!({"type": "tool-output-available", "index": 0, "toolCallId": "call-1", "output": {"location": "Paris", "temperature": 18, "condition": "Sunny"}}))
            .frame(&json!({"type": "text-delta", "index": 1, "delta": "It's 18°C and sunny "}))
            .frame(&json!({"type": "text-delta", "index": 1, "delta": "in Paris."}))
            .frame(&json!({"type": "finish"}));
        feed.end();

        assert_eq!(session.wait_until_settled().await, SessionStatus::Ready);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert!(snapshot.last_error.is_none());

        let reply = &snapshot.messages[1];
        assert_eq!(reply.id, "msg-1");
        assert_eq!(reply.status, MessageStatus::Complete);
        assert_eq!(reply.text(), "It's 18°C and sunny in Paris.");

        let call = reply.parts[0].as_tool_call().unwrap();
        assert_eq!(call.status(), ToolCallStatus::OutputAvailable);
        assert!(matches!(KnownTool::from_part(call), Some(KnownTool::GetWeather(input)) if input.city == "Paris"));
        let report = WeatherReport::from_output(call.output().unwrap()).unwrap();
        assert_eq!(report.condition, "Sunny");

        let requests = transport.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message_text, "What's the weather in Paris?");
        assert_eq!(requests[0].id, session.id());
        assert_eq!(requests[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_weather_tool_error_scenario() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("Weather in Atlantis?", &[]).unwrap();

        feed.frame(&json!({"type": "tool-input-available", "index": 0, "toolCallId": "call-1", "toolName": "getWeather", "input": {"city": "Atlantis"}}))
            .frame(&json!({"type": "tool-output-error", "index": 0, "toolCallId": "call-1", "errorText": "City not found"}))
            // Terminal: this output must be ignored
            .frame(&json!({"type": "tool-output-available", "index": 0, "toolCallId": "call-1", "output": {}}))
            .frame(&json!({"type": "text-delta", "index": 1, "delta": "I couldn't find that city."}));
        feed.end();

        // A failed tool is data, not a failed turn
        assert_eq!(session.wait_until_settled().await, SessionStatus::Ready);
        let snapshot = session.snapshot();
        let reply = &snapshot.messages[1];
        assert_eq!(reply.status, MessageStatus::Complete);

        let call = reply.parts[0].as_tool_call().unwrap();
        assert_eq!(call.status(), ToolCallStatus::OutputError);
        assert_eq!(call.output(), None);
        let error = call.execution_error().unwrap();
        assert_eq!(error.error_text, "City not found");
        assert_eq!(error.tool_name, "getWeather");
        assert_eq!(reply.text(), "I couldn't find that city.");
    }

    #[tokio::test]
    async fn test_stop_during_streaming_freezes_message() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("Tell me a long story", &[]).unwrap();

        feed.frame(&json!({"type": "text-delta", "index": 0, "delta": "Once upon"}));
        wait_for(&session, WAIT, |s| assistant_text(s) == "Once upon").await;

        session.stop().unwrap();
        assert_eq!(session.status(), SessionStatus::Ready);
        assert!(transport.token(0).is_cancelled());

        // Anything sent after the stop is never applied
        feed.frame(&json!({"type": "text-delta", "index": 0, "delta": " a time"}))
            .frame(&json!({"type": "finish"}));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = session.snapshot();
        assert_eq!(assistant_text(&snapshot), "Once upon");
        assert_eq!(snapshot.messages[1].status, MessageStatus::Stopped);
        assert!(snapshot.last_error.is_none());

        assert!(matches!(
            session.stop(),
            Err(SessionError::InvalidState { operation: "stop", status: SessionStatus::Ready })
        ));
    }

    #[tokio::test]
    async fn test_stop_before_first_event() {
        let (session, transport) = session();
        let _feed = transport.expect_turn();
        session.submit("hello", &[]).unwrap();

        session.stop().unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        // Only the user message; no assistant message was ever opened
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_while_busy_is_rejected() {
        let (session, transport) = session();
        let _feed = transport.expect_turn();
        session.submit("first", &[]).unwrap();
        let before = session.snapshot();

        let err = session.submit("second", &[]).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidState {
                operation: "submit",
                status: SessionStatus::Submitted
            }
        );

        let after = session.snapshot();
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.version, before.version);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_partial_text_and_recovers() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();

        feed.frame(&json!({"type": "text-delta", "index": 0, "delta": "Hel"}));
        wait_for(&session, WAIT, |s| assistant_text(s) == "Hel").await;
        feed.fail(TransportError::stream("connection reset"));

        assert_eq!(session.wait_until_settled().await, SessionStatus::Error);
        let snapshot = session.snapshot();
        assert_eq!(assistant_text(&snapshot), "Hel");
        assert_eq!(snapshot.messages[1].status, MessageStatus::Failed);
        assert!(matches!(
            snapshot.last_error,
            Some(SessionError::Transport(ref e)) if e.kind == TransportErrorKind::Stream
        ));

        // A fresh submit is accepted and clears the error
        let feed = transport.expect_turn();
        session.submit("try again", &[]).unwrap();
        assert!(session.last_error().is_none());
        feed.frame(&json!({"type": "text-delta", "index": 0, "delta": "Hello!"}));
        feed.end();

        assert_eq!(session.wait_until_settled().await, SessionStatus::Ready);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages.len(), 4);
        assert_eq!(snapshot.messages[3].text(), "Hello!");
        // The earlier failed message is untouched
        assert_eq!(snapshot.messages[1].text(), "Hel");
        assert_eq!(transport.recorded_requests()[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_error_frame_fails_turn() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();

        feed.frame(&json!({"type": "text-delta", "index": 0, "delta": "partial"}))
            .frame(&json!({"type": "error", "errorText": "model overloaded"}));

        assert_eq!(session.wait_until_settled().await, SessionStatus::Error);
        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.last_error,
            Some(SessionError::Remote {
                reason: "model overloaded".to_string()
            })
        );
        assert_eq!(snapshot.messages[1].text(), "partial");
        assert_eq!(snapshot.messages[1].status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn test_index_conflict_fails_turn() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();

        feed.frame(&json!({"type": "text-delta", "index": 0, "delta": "x"}))
            .frame(&json!({"type": "tool-input-delta", "index": 0, "toolCallId": "c1", "toolName": "getWeather", "inputDelta": "{"}));

        assert_eq!(session.wait_until_settled().await, SessionStatus::Error);
        let snapshot = session.snapshot();
        assert!(matches!(
            snapshot.last_error,
            Some(SessionError::Protocol(ProtocolError::IndexConflict { index: 0, .. }))
        ));
        assert_eq!(snapshot.messages[1].parts, vec![Part::text("x")]);
    }

    #[tokio::test]
    async fn test_malformed_frame_fails_turn() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();

        feed.raw("{\"type\":\"text-delta\",\"index\":0,\"delta\":\"ok\"}\n")
            .raw("{not json}\n");

        assert_eq!(session.wait_until_settled().await, SessionStatus::Error);
        assert!(matches!(
            session.last_error(),
            Some(SessionError::Protocol(ProtocolError::MalformedFrame { line: 2, .. }))
        ));
        assert_eq!(assistant_text(&session.snapshot()), "ok");
    }

    #[tokio::test]
    async fn test_frames_before_malformed_line_in_same_chunk_are_kept() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();

        feed.raw("{\"type\":\"text-delta\",\"index\":0,\"delta\":\"ok\"}\n{not json}\n");

        assert_eq!(session.wait_until_settled().await, SessionStatus::Error);
        let snapshot = session.snapshot();
        assert!(matches!(
            snapshot.last_error,
            Some(SessionError::Protocol(ProtocolError::MalformedFrame { line: 2, .. }))
        ));
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].text(), "ok");
        assert_eq!(snapshot.messages[1].status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn test_open_failure_sets_error() {
        let (session, transport) = session();
        transport.expect_open_error(TransportError::auth("bad key"));
        session.submit("hi", &[]).unwrap();

        assert_eq!(session.wait_until_settled().await, SessionStatus::Error);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(matches!(
            snapshot.last_error,
            Some(SessionError::Transport(ref e)) if e.kind == TransportErrorKind::Auth
        ));
    }

    #[tokio::test]
    async fn test_end_without_finish_completes_message() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();

        // Last line has no trailing newline
        feed.raw("{\"type\":\"text-delta\",\"index\":0,\"delta\":\"a\"}\n")
            .raw("{\"type\":\"text-delta\",\"index\":0,\"delta\":\"b\"}");
        feed.end();

        assert_eq!(session.wait_until_settled().await, SessionStatus::Ready);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages[1].text(), "ab");
        assert_eq!(snapshot.messages[1].status, MessageStatus::Complete);
    }

    #[tokio::test]
    async fn test_status_updates_are_published_in_order() {
        let (session, transport) = session();
        let mut updates = session.subscribe();
        let feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();
        feed.frame(&json!({"type": "text-delta", "index": 0, "delta": "yo"}));
        feed.end();
        session.wait_until_settled().await;

        let mut statuses = Vec::new();
        let mut last_version = 0;
        while let Ok(update) = updates.try_recv() {
            match update {
                SessionUpdate::StatusChanged { status } => statuses.push(status),
                SessionUpdate::MessagesChanged { version } => {
                    assert!(version > last_version);
                    last_version = version;
                }
            }
        }
        assert_eq!(
            statuses,
            vec![SessionStatus::Submitted, SessionStatus::Streaming, SessionStatus::Ready]
        );
        assert_eq!(last_version, session.snapshot().version);
    }

    #[tokio::test]
    async fn test_attachments_become_file_parts_and_request_entries() {
        let (session, transport) = session();
        let feed = transport.expect_turn();
        let attachment = Attachment::new("notes.txt", "text/plain", b"pack an umbrella".to_vec());

        session.submit("Summarize this", &[attachment]).unwrap();
        feed.end();
        session.wait_until_settled().await;

        let snapshot = session.snapshot();
        let user = &snapshot.messages[0];
        assert!(matches!(&user.parts[1], Part::File(f) if f.url.starts_with("data:text/plain;base64,")));

        let request = &transport.recorded_requests()[0];
        assert_eq!(request.attachments.len(), 1);
        assert_eq!(request.attachments[0].filename, "notes.txt");
    }

    #[tokio::test]
    async fn test_dropping_session_cancels_turn() {
        let (session, transport) = session();
        let _feed = transport.expect_turn();
        session.submit("hi", &[]).unwrap();
        wait_for(&session, WAIT, |_| !transport.tokens.lock().unwrap().is_empty()).await;

        drop(session);
        assert!(transport.token(0).is_cancelled());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (a, transport_a) = session();
        let (b, _transport_b) = session();
        let feed = transport_a.expect_turn();

        a.submit("only in a", &[]).unwrap();
        feed.end();
        a.wait_until_settled().await;

        assert_ne!(a.id(), b.id());
        assert_eq!(a.snapshot().messages.len(), 1);
        assert!(b.snapshot().messages.is_empty());
        assert_eq!(b.status(), SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_scripted_sse_body_split_mid_frame() {
        let transport = ScriptedTransport::new().with_body([
            "data: {\"type\":\"start\"}\n\ndata: {\"type\":\"text-de",
            "lta\",\"index\":0,\"delta\":\"18°\"}\n\n",
            "data: {\"type\":\"finish\"}\n\ndata: [DONE]\n\n",
        ]);
        let session = ChatSession::new(transport);
        session.submit("temp?", &[]).unwrap();

        assert_eq!(session.wait_until_settled().await, SessionStatus::Ready);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages[1].text(), "18°");
        assert_eq!(snapshot.messages[1].status, MessageStatus::Complete);
    }
}
