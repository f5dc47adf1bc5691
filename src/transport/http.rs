//! HTTP transport: POST the turn, stream the response body

use super::{EventSource, Transport, TransportError};
use crate::config::SessionConfig;
use crate::protocol::ChatRequest;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &SessionConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::unknown(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    fn classify_error(e: &reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            TransportError::network(format!("Connection failed: {e}"))
        } else if e.is_request() {
            TransportError::network(format!("Request failed: {e}"))
        } else {
            TransportError::unknown(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventSource, TransportError> {
        let send = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::cancelled()),
            result = send => result.map_err(|e| Self::classify_error(&e))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransportError::cancelled()),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(TransportError::from_status(status.as_u16(), &body));
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            status = status.as_u16(),
            content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
            "Response headers received"
        );

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::stream(e.to_string())));
        Ok(EventSource::new(body, cancel))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
