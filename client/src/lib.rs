//! Confab Client
//!
//! Conversation state and incremental stream reassembly for talking to a
//! confab daemon. The crate is UI-agnostic: [`ChatClient`] mutates the
//! conversation and fires a refresh callback; the binary in this package
//! is a minimal line-oriented surface over it.

pub mod chat;
pub mod decode;
pub mod transport;

pub use chat::{ChatClient, GREETING};
pub use decode::StreamDecoder;
pub use transport::{BodyEvent, HttpTransport, TransportError, TurnTransport};
