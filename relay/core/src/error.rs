//! Relay Error Taxonomy
//!
//! Four failure classes with distinct surfacing rules:
//!
//! - malformed input: the request body did not parse as a conversation
//! - provider call: network, authentication, or quota failure reaching the
//!   model provider
//! - retrieval: embedding or vector-index lookup failure (no fallback to an
//!   unaugmented prompt)
//! - stream: a failure that aborts a whole in-flight stream
//!
//! Single-chunk decode failures are *not* errors at this level: the chunk
//! normalizer logs and skips them and the stream continues.

use thiserror::Error;

/// Failure calling the model provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The outbound HTTP request could not be built or sent
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code returned by the provider
        status: u16,
        /// Response body text, if readable
        body: String,
    },

    /// The provider body could not be interpreted
    #[error("provider response malformed: {0}")]
    Malformed(String),
}

/// Failure during context retrieval
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding the query failed
    #[error("embedding query failed: {0}")]
    Embedding(String),

    /// Querying the vector index failed
    #[error("vector index query failed: {0}")]
    Index(String),
}

/// Top-level relay failure, surfaced to the HTTP caller
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request body was not an array of role/content pairs
    #[error("invalid conversation payload: {0}")]
    InvalidConversation(String),

    /// The provider call failed before any output was produced
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Context retrieval failed
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// The in-flight stream was aborted
    #[error("stream aborted: {0}")]
    Stream(String),
}
