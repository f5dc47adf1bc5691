//! Transport abstraction
//!
//! A transport sends one turn's request and hands back the raw response
//! body as an [`EventSource`]. It knows nothing about frames or messages.

mod error;
mod http;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpTransport;

use crate::protocol::ChatRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Raw response body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Common interface for transports
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`. Exactly one outbound request per call, no retries.
    ///
    /// Cancelling `cancel` aborts the request and the returned source.
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventSource, TransportError>;

    /// Where requests go, for logs
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventSource, TransportError> {
        (**self).open(request, cancel).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// One item read from an [`EventSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    Data(Bytes),
    /// The body ended normally
    End,
    Failed(TransportError),
    /// Aborted through the cancellation token
    Cancelled,
}

impl SourceItem {
    fn is_final(&self) -> bool {
        !matches!(self, SourceItem::Data(_))
    }
}

/// A finite, non-restartable response body.
///
/// After the first `End`, `Failed` or `Cancelled` item every further read
/// returns `None`.
pub struct EventSource {
    stream: ByteStream,
    cancel: CancellationToken,
    done: bool,
}

impl EventSource {
    pub fn new(
        stream: impl Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream: Box::pin(stream),
            cancel,
            done: false,
        }
    }

    /// Next chunk or completion signal.
    ///
    /// Cancellation wins over any data or error that is ready at the same time.
    pub async fn next_chunk(&mut self) -> Option<SourceItem> {
        if self.done {
            return None;
        }

        let item = tokio::select! {
            biased;
            () = self.cancel.cancelled() => SourceItem::Cancelled,
            next = self.stream.next() => match next {
                Some(Ok(bytes)) => SourceItem::Data(bytes),
                Some(Err(e)) if e.is_cancelled() => SourceItem::Cancelled,
                Some(Err(e)) => SourceItem::Failed(e),
                None => SourceItem::End,
            },
        };

        if item.is_final() {
            self.done = true;
        }
        Some(item)
    }

    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
    endpoint: String,
}

impl LoggingTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        let endpoint = inner.endpoint().to_string();
        Self { inner, endpoint }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventSource, TransportError> {
        let start = std::time::Instant::now();
        let result = self.inner.open(request, cancel).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    session_id = %request.id,
                    history = request.messages.len(),
                    attachments = request.attachments.len(),
                    duration_ms = %duration.as_millis(),
                    "Response stream opened"
                );
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    session_id = %request.id,
                    duration_ms = %duration.as_millis(),
                    "Request cancelled before response"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %self.endpoint,
                    session_id = %request.id,
                    duration_ms = %duration.as_millis(),
                    kind = %e.kind,
                    error = %e.message,
                    "Request failed"
                );
            }
        }

        result
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
