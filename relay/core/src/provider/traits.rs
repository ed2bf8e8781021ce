//! Model Provider Traits
//!
//! Trait definitions for hosted model providers. The relay works against
//! this interface so provider-specific wire formats (request bodies, chunk
//! envelopes, role names) stay out of the orchestration logic.
//!
//! # Streaming Contract
//!
//! [`ModelProvider::open_stream`] returns a channel receiver of
//! [`ChunkEvent`]s. The producer sends raw chunks in arrival order and
//! terminates with exactly one `Complete` or `Error`; dropping the receiver
//! tells the producer to stop reading and release the provider connection.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::chunk::RawChunk;
use crate::error::ProviderError;
use crate::messages::Message;

/// Fixed generation parameters sent with every invocation
///
/// These are configuration constants, not computed values.
#[derive(Clone, Copy, Debug)]
pub struct GenerationParams {
    /// Maximum tokens in the response
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Top-k sampling cutoff
    pub top_k: u32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            temperature: 0.7,
            top_k: 250,
            top_p: 0.999,
        }
    }
}

/// An outbound model invocation
///
/// `messages` is the already-assembled outbound list: instruction first,
/// then the optional retrieved-context message, then the conversation.
/// Role translation to the provider's wire format happens inside the
/// provider implementation.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    /// Outbound message list, instruction message first
    pub messages: Vec<Message>,
    /// Generation parameters
    pub params: GenerationParams,
}

impl ModelRequest {
    /// Create a request with default generation parameters
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            params: GenerationParams::default(),
        }
    }

    /// Set generation parameters
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

/// Events on a provider chunk channel
#[derive(Clone, Debug)]
pub enum ChunkEvent {
    /// A raw output chunk, in arrival order
    Chunk(RawChunk),
    /// The provider signalled completion
    Complete,
    /// The stream failed; no further chunks will arrive
    Error(String),
}

/// A hosted model provider
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Send a request and wait for the complete response
    ///
    /// The provider's parsed JSON body is returned unchanged so the caller
    /// can forward it verbatim.
    async fn invoke(&self, request: &ModelRequest) -> Result<serde_json::Value, ProviderError>;

    /// Send a request and open an incremental chunk channel
    ///
    /// Chunks arrive in receipt order with no other ordering key; the
    /// channel terminates with `Complete` or `Error`.
    async fn open_stream(
        &self,
        request: &ModelRequest,
    ) -> Result<mpsc::Receiver<ChunkEvent>, ProviderError>;
}
