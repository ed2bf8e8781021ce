//! Turn Transport
//!
//! Handles communication with the confab daemon. The trait seam keeps the
//! chat state machine independent of the HTTP stack, so tests can script
//! reply bodies fragment by fragment.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use confab_core::Message;

/// Channel capacity for reply body fragments
const BODY_CHANNEL_CAPACITY: usize = 100;

/// Failure reaching the relay or reading its reply
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent
    #[error("request failed: {0}")]
    Request(String),

    /// The relay answered with a non-success status
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// The reply body could not be interpreted
    #[error("malformed reply body: {0}")]
    Malformed(String),
}

/// One unit read from a streamed reply body
#[derive(Clone, Debug)]
pub enum BodyEvent {
    /// A fragment of the body, in receipt order
    Data(Bytes),
    /// The body failed mid-read; the channel closes after this
    Error(String),
}

/// Transport for submitting one conversation turn
#[async_trait]
pub trait TurnTransport: Send + Sync {
    /// Submit a turn and stream the reply body
    ///
    /// The channel closes when the body ends; a terminal [`BodyEvent::Error`]
    /// precedes the close on failure.
    async fn stream_turn(
        &self,
        conversation: &[Message],
    ) -> Result<mpsc::Receiver<BodyEvent>, TransportError>;

    /// Submit a turn and wait for the provider-shaped JSON reply
    async fn complete_turn(
        &self,
        conversation: &[Message],
    ) -> Result<serde_json::Value, TransportError>;
}

/// HTTP transport to a confab daemon
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the daemon at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create a transport from `CONFAB_SERVER` (default: localhost daemon)
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("CONFAB_SERVER")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        Self::new(base_url)
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl TurnTransport for HttpTransport {
    async fn stream_turn(
        &self,
        conversation: &[Message],
    ) -> Result<mpsc::Receiver<BodyEvent>, TransportError> {
        use futures::StreamExt;

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&conversation)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let mut stream = response.bytes_stream();

        tokio::spawn(async move {
            while let Some(piece) = stream.next().await {
                match piece {
                    Ok(bytes) => {
                        if tx.send(BodyEvent::Data(bytes)).await.is_err() {
                            // Consumer gone: stop reading, abort the request
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(BodyEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn complete_turn(
        &self,
        conversation: &[Message],
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .http_client
            .post(self.chat_url())
            .json(&conversation)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }
}
