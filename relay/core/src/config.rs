//! Relay Configuration
//!
//! Immutable configuration resolved once at startup and injected at
//! construction. Everything comes from environment variables; there are no
//! config files.
//!
//! # Environment Variables
//!
//! - `CONFAB_INSTRUCTION`: override the built-in instruction prompt
//! - `CONFAB_STREAM`: `true` (default) to relay incrementally, `false` to
//!   forward the provider's complete JSON body
//!
//! Provider and retrieval settings are documented on their own `from_env`
//! constructors ([`crate::provider::BedrockConfig`],
//! [`crate::retrieval::RetrievalConfig`]).

/// Built-in instruction prompt, prepended server-side to every outbound
/// request and never stored in the client-visible conversation.
pub const DEFAULT_INSTRUCTION: &str = "\
You are the support assistant for Confab, a hosted chat platform.

Greet users politely and introduce yourself as the Confab assistant. Ask
clarifying questions to understand what the user needs, then answer
questions about accounts, billing, connectivity, and platform features
clearly and concisely. If you cannot resolve an issue, offer to escalate
it to a human agent and say how to reach one.

Keep interactions friendly and professional. Use no more than 200 words.";

/// Relay-level configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// The fixed instruction prompt
    pub instruction: String,
    /// Whether to relay the provider's incremental output (streaming) or
    /// forward its complete JSON body (single-shot)
    pub streaming: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            instruction: DEFAULT_INSTRUCTION.to_string(),
            streaming: true,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let instruction = std::env::var("CONFAB_INSTRUCTION")
            .unwrap_or_else(|_| DEFAULT_INSTRUCTION.to_string());
        let streaming = std::env::var("CONFAB_STREAM")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            instruction,
            streaming,
        }
    }
}
