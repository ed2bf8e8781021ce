//! Relay Orchestration
//!
//! The relay takes an inbound conversation, prepends the fixed instruction
//! message (and, when retrieval is configured, a retrieved-context
//! message), forwards the result to the model provider, and re-emits the
//! provider's output: either the complete JSON body unchanged, or a
//! normalized fragment stream.
//!
//! # Streaming Pipeline
//!
//! ```text
//! provider chunk channel -> normalizer pump -> fragment channel -> caller
//! ```
//!
//! The pump normalizes each chunk, skips the unusable ones, and closes the
//! fragment channel with a terminal `Complete` or `Error`. Fragments
//! already forwarded are never retracted. Dropping the fragment receiver
//! stops the pump, which drops the chunk receiver, which stops the
//! provider read loop: every hop observes its consumer's disappearance.
//!
//! The relay is stateless across requests: no session, no persisted
//! conversation, no shared mutable state.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::messages::{Conversation, Message};
use crate::provider::{normalize, ChunkEvent, ModelProvider, ModelRequest};
use crate::retrieval::ContextRetriever;

/// Channel capacity for normalized fragments
const FRAGMENT_CHANNEL_CAPACITY: usize = 100;

/// A normalized unit re-emitted by the relay
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFragment {
    /// A plain UTF-8 text fragment
    Text(String),
    /// The stream finished normally
    Complete,
    /// The stream was aborted; fragments already emitted stand
    Error(String),
}

/// A relay reply: incremental or complete
#[derive(Debug)]
pub enum RelayReply {
    /// Normalized fragment stream
    Stream(mpsc::Receiver<StreamFragment>),
    /// The provider's complete JSON body, unchanged
    Complete(serde_json::Value),
}

/// The relay: instruction injection, optional retrieval, provider dispatch
pub struct Relay<P> {
    provider: P,
    retriever: Option<ContextRetriever>,
    config: RelayConfig,
}

impl<P: ModelProvider> Relay<P> {
    /// Create a relay without context augmentation
    pub fn new(provider: P, config: RelayConfig) -> Self {
        Self {
            provider,
            retriever: None,
            config,
        }
    }

    /// Attach an optional context retriever
    ///
    /// `None` leaves augmentation disabled, so callers can pass
    /// `ContextRetriever::from_env()` straight through.
    #[must_use]
    pub fn with_retriever(mut self, retriever: Option<ContextRetriever>) -> Self {
        self.retriever = retriever;
        self
    }

    /// Handle one conversation
    ///
    /// Streaming or single-shot is decided by configuration, not request
    /// data. Failures before any output surface as `Err`; failures after
    /// the stream opened surface as an `Error` fragment.
    pub async fn handle(&self, conversation: Conversation) -> Result<RelayReply, RelayError> {
        let context = match &self.retriever {
            Some(retriever) => {
                let query = conversation.last_user_content().unwrap_or_default();
                Some(retriever.retrieve(query).await?)
            }
            None => None,
        };

        let outbound = self.outbound_messages(&conversation, context);
        debug!(
            messages = outbound.len(),
            streaming = self.config.streaming,
            "dispatching conversation to provider"
        );
        let request = ModelRequest::new(outbound);

        if self.config.streaming {
            let chunk_rx = self.provider.open_stream(&request).await?;
            Ok(RelayReply::Stream(spawn_normalizer_pump(chunk_rx)))
        } else {
            let body = self.provider.invoke(&request).await?;
            Ok(RelayReply::Complete(body))
        }
    }

    /// Assemble the outbound message list
    ///
    /// Instruction first, then the optional context message, then the
    /// conversation unchanged. The instruction never appears in the
    /// client-visible conversation; it exists only here.
    fn outbound_messages(
        &self,
        conversation: &Conversation,
        context: Option<String>,
    ) -> Vec<Message> {
        let mut outbound = Vec::with_capacity(conversation.len() + 2);
        outbound.push(Message::system(self.config.instruction.clone()));
        if let Some(context) = context {
            outbound.push(Message::user(format!("Context: {context}")));
        }
        outbound.extend(conversation.iter().cloned());
        outbound
    }
}

/// Spawn the normalizer pump between a chunk channel and a fragment channel
fn spawn_normalizer_pump(
    mut chunk_rx: mpsc::Receiver<ChunkEvent>,
) -> mpsc::Receiver<StreamFragment> {
    let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(event) = chunk_rx.recv().await {
            match event {
                ChunkEvent::Chunk(chunk) => {
                    if let Some(text) = normalize(chunk) {
                        if tx.send(StreamFragment::Text(text)).await.is_err() {
                            // Caller went away; dropping chunk_rx on return
                            // stops the provider read loop
                            debug!("fragment receiver dropped, aborting relay stream");
                            return;
                        }
                    }
                }
                ChunkEvent::Complete => {
                    let _ = tx.send(StreamFragment::Complete).await;
                    return;
                }
                ChunkEvent::Error(error) => {
                    warn!(error = %error, "provider stream failed");
                    let _ = tx.send(StreamFragment::Error(error)).await;
                    return;
                }
            }
        }

        // Producer hung up without a terminal signal
        let _ = tx
            .send(StreamFragment::Error(
                "stream disconnected unexpectedly".to_string(),
            ))
            .await;
    });

    rx
}
