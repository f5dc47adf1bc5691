//! Chat session controller
//!
//! Owns the message store and the session state machine, and runs one pump
//! task per turn: transport chunks -> decoder -> merger.
//!
//! Store, state and the turn's cancellation token live behind a single
//! mutex. Every decoded event is merged while holding it, and only if its
//! turn is still the current one; `stop()` cancels and clears the turn under
//! the same lock. Once `stop()` returns, nothing from that turn is applied.
//! The lock is never held across an `.await`.

#[cfg(test)]
pub mod testing;

use crate::attachments::Attachment;
use crate::error::SessionError;
use crate::protocol::{ChatRequest, DecodeBatch, Decoder, ProtocolEvent};
use crate::state_machine::{
    transition, Effect, Event, SessionState, SessionStatus, TransitionError, TurnId,
};
use crate::store::{self, MergeOutcome, Message, MessageStore};
use crate::transport::{SourceItem, Transport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Notifications sent to subscribers. Read [`ChatSession::snapshot`] for content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    MessagesChanged { version: u64 },
    StatusChanged { status: SessionStatus },
}

/// Immutable view of a session at one point in time
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub status: SessionStatus,
    pub last_error: Option<SessionError>,
    /// Store version; grows with every change to `messages`
    pub version: u64,
}

impl SessionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// One chat session. Independent sessions share nothing.
///
/// Dropping the session cancels the turn in flight, if any.
pub struct ChatSession<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    id: String,
    transport: T,
    core: Mutex<Core>,
    updates: broadcast::Sender<SessionUpdate>,
    status: watch::Sender<SessionStatus>,
}

struct Core {
    state: SessionState,
    store: MessageStore,
    next_turn: TurnId,
    /// Cancels the turn in flight
    cancel: Option<CancellationToken>,
}

/// Work to start once the lock is released
struct TurnStart {
    turn: TurnId,
    cancel: CancellationToken,
}

impl<T: Transport + 'static> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), transport)
    }

    pub fn with_id(id: impl Into<String>, transport: T) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(SessionStatus::Ready);
        Self {
            shared: Arc::new(Shared {
                id: id.into(),
                transport,
                core: Mutex::new(Core {
                    state: SessionState::Ready,
                    store: MessageStore::new(),
                    next_turn: TurnId::first(),
                    cancel: None,
                }),
                updates,
                status,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Send a user turn.
    ///
    /// The user message is appended before this returns; the request is sent
    /// from a spawned task, so this must be called within a tokio runtime.
    /// Allowed while ready or after an error, refused while a turn is running.
    pub fn submit(&self, text: &str, attachments: &[Attachment]) -> Result<TurnId, SessionError> {
        let (turn, request, cancel) = {
            let mut core = self.shared.lock();
            let turn = core.next_turn;
            let event = Event::Submit {
                turn,
                message: Message::user(text, attachments),
            };

            let start = self
                .shared
                .apply_event(&mut core, event)
                .map_err(|e| invalid_state(e, core.state.status()))?;
            core.next_turn = turn.next();

            let Some(TurnStart { turn, cancel }) = start else {
                return Ok(turn);
            };
            let request = ChatRequest::new(
                self.shared.id.clone(),
                text,
                attachments,
                core.store.messages().to_vec(),
            );
            (turn, request, cancel)
        };

        tracing::info!(session_id = %self.shared.id, %turn, "Turn submitted");
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.run_turn(turn, request, cancel).await });
        Ok(turn)
    }

    /// Stop the turn in flight. The partial assistant message is kept,
    /// marked stopped, and the session returns to ready.
    pub fn stop(&self) -> Result<(), SessionError> {
        let mut core = self.shared.lock();
        let turn = core.state.turn();
        self.shared
            .apply_event(&mut core, Event::Stop)
            .map_err(|e| invalid_state(e, core.state.status()))?;
        tracing::info!(session_id = %self.shared.id, turn = ?turn, "Turn stopped");
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let core = self.shared.lock();
        SessionSnapshot {
            messages: core.store.messages().to_vec(),
            status: core.state.status(),
            last_error: core.state.last_error().cloned(),
            version: core.store.version(),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().store.messages().to_vec()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().state.status()
    }

    pub fn last_error(&self) -> Option<SessionError> {
        self.shared.lock().state.last_error().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.status().is_loading()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Wait until no turn is running, returning the settled status
    pub async fn wait_until_settled(&self) -> SessionStatus {
        let mut rx = self.watch_status();
        let settled = match rx.wait_for(|status| !status.is_loading()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        settled
    }
}

impl<T: Transport + 'static> Drop for ChatSession<T> {
    fn drop(&mut self) {
        let mut core = self.shared.lock();
        if let Some(cancel) = core.cancel.take() {
            tracing::debug!(session_id = %self.shared.id, "Session dropped, cancelling turn");
            cancel.cancel();
        }
    }
}

fn invalid_state(error: TransitionError, status: SessionStatus) -> SessionError {
    match error {
        TransitionError::InvalidState { operation, status } => {
            SessionError::InvalidState { operation, status }
        }
        TransitionError::StaleTurn { .. } => SessionError::InvalidState {
            operation: "continue",
            status,
        },
    }
}

impl<T: Transport> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, update: SessionUpdate) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }

    fn notify_messages(&self, core: &Core) {
        self.notify(SessionUpdate::MessagesChanged {
            version: core.store.version(),
        });
    }

    /// Transition and execute the effects. Caller holds the lock.
    fn apply_event(&self, core: &mut Core, event: Event) -> Result<Option<TurnStart>, TransitionError> {
        let name = event.name();
        let result = transition(&core.state, event)?;
        tracing::debug!(
            session_id = %self.id,
            event = name,
            from = %core.state.status(),
            to = %result.new_state.status(),
            "State transition"
        );
        core.state = result.new_state;

        let mut start = None;
        for effect in result.effects {
            match effect {
                Effect::AppendMessage { message } => {
                    core.store.push(message);
                    self.notify_messages(core);
                }
                Effect::OpenTransport { turn } => {
                    let cancel = CancellationToken::new();
                    core.cancel = Some(cancel.clone());
                    start = Some(TurnStart { turn, cancel });
                }
                Effect::AbortTransport { turn } => {
                    if let Some(cancel) = core.cancel.take() {
                        tracing::debug!(session_id = %self.id, %turn, "Aborting transport");
                        cancel.cancel();
                    }
                }
                Effect::FreezeOpenMessage { status } => {
                    if core.store.freeze_open(status).is_some() {
                        self.notify_messages(core);
                    }
                }
                Effect::NotifyStatus { status } => {
                    self.status.send_replace(status);
                    self.notify(SessionUpdate::StatusChanged { status });
                }
            }
        }

        if !core.state.is_busy() {
            core.cancel = None;
        }
        Ok(start)
    }

    /// Apply a pump event if its turn is still current
    fn apply_turn_event(&self, core: &mut Core, event: Event) -> bool {
        match self.apply_event(core, event) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(session_id = %self.id, error = %e, "Ignoring event from ended turn");
                false
            }
        }
    }

    fn is_current(core: &Core, turn: TurnId) -> bool {
        core.state.turn() == Some(turn)
    }

    // ========================================================================
    // Pump
    // ========================================================================

    async fn run_turn(self: Arc<Self>, turn: TurnId, request: ChatRequest, cancel: CancellationToken) {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            opened = self.transport.open(&request, cancel.clone()) => opened,
        };
        let mut source = match opened {
            Ok(source) => source,
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                self.fail(turn, e.into());
                return;
            }
        };

        let mut decoder = Decoder::new();
        loop {
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                item = source.next_chunk() => item,
            };

            match item {
                Some(SourceItem::Data(bytes)) => {
                    if !self.merge(turn, decoder.feed(&bytes)) {
                        return;
                    }
                }
                Some(SourceItem::End) => {
                    if self.merge(turn, decoder.finish().into()) {
                        self.finish(turn);
                    }
                    return;
                }
                Some(SourceItem::Failed(e)) => {
                    self.fail(turn, e.into());
                    return;
                }
                Some(SourceItem::Cancelled) | None => return,
            }
        }
    }

    /// Merge decoded events, then fail the turn on a decode error.
    /// Returns whether the turn goes on.
    fn merge(&self, turn: TurnId, batch: DecodeBatch) -> bool {
        let mut core = self.lock();
        if !Self::is_current(&core, turn) {
            tracing::debug!(session_id = %self.id, %turn, "Dropping events from ended turn");
            return false;
        }

        let DecodeBatch { events, error } = batch;

        let mut changed = false;
        let mut keep_going = true;
        for event in events {
            if matches!(core.state, SessionState::Submitted { .. }) {
                self.apply_turn_event(&mut core, Event::StreamActivity { turn });
            }

            if let ProtocolEvent::StreamError { reason } = event {
                self.fail_locked(&mut core, turn, SessionError::Remote { reason });
                keep_going = false;
                break;
            }

            tracing::trace!(session_id = %self.id, %turn, kind = event.kind(), index = ?event.index(), "Merging event");
            match store::apply(&mut core.store, event) {
                Ok(MergeOutcome::Applied) => changed = true,
                Ok(MergeOutcome::Dropped { .. }) => {}
                Err(e) => {
                    if changed {
                        self.notify_messages(&core);
                        changed = false;
                    }
                    self.fail_locked(&mut core, turn, e.into());
                    keep_going = false;
                    break;
                }
            }
        }

        if changed {
            self.notify_messages(&core);
        }
        if let (true, Some(e)) = (keep_going, error) {
            self.fail_locked(&mut core, turn, e.into());
            keep_going = false;
        }
        keep_going
    }

    fn finish(&self, turn: TurnId) {
        let mut core = self.lock();
        if self.apply_turn_event(&mut core, Event::StreamFinished { turn }) {
            tracing::info!(
                session_id = %self.id,
                %turn,
                messages = core.store.len(),
                "Turn complete"
            );
        }
    }

    fn fail(&self, turn: TurnId, error: SessionError) {
        let mut core = self.lock();
        self.fail_locked(&mut core, turn, error);
    }

    fn fail_locked(&self, core: &mut Core, turn: TurnId, error: SessionError) {
        if !Self::is_current(core, turn) {
            return;
        }
        tracing::error!(
            session_id = %self.id,
            %turn,
            kind = error.kind(),
            error = %error,
            "Turn failed"
        );
        self.apply_turn_event(core, Event::StreamFailed { turn, error });
    }
}
