//! Model Provider Abstraction
//!
//! Trait seam between the relay and hosted model providers, plus the
//! concrete Bedrock-style REST implementation. The relay only ever sees
//! [`ModelProvider`]: a single-shot JSON invocation and an incremental
//! chunk channel with a defined close/error signal.

pub mod bedrock;
pub mod chunk;
pub mod traits;

pub use bedrock::{BedrockConfig, BedrockProvider};
pub use chunk::{normalize, RawChunk};
pub use traits::{ChunkEvent, GenerationParams, ModelProvider, ModelRequest};
