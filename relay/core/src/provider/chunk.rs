//! Chunk Normalizer
//!
//! Providers deliver output chunks in heterogeneous shapes: a raw binary
//! unit that needs a UTF-8 decode, a binary payload nested under a
//! provider envelope field, or text the transport already decoded. This
//! module makes them uniform before re-emission.
//!
//! # Skip Policy
//!
//! A chunk that matches none of the recognized shapes, fails to decode, or
//! fails to parse as the expected completion payload is logged and skipped;
//! the stream continues. A chunk whose text payload is empty or absent is
//! also skipped, so no empty fragment is ever forwarded.

use serde::Deserialize;
use tracing::{trace, warn};

/// A provider output chunk before normalization
///
/// A closed set of tagged variants, dispatched by explicit shape
/// inspection rather than runtime type probing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawChunk {
    /// Raw binary unit requiring a UTF-8 decode
    Bytes(Vec<u8>),
    /// Binary payload that was nested under the provider envelope field
    Wrapped {
        /// The unwrapped payload bytes
        bytes: Vec<u8>,
    },
    /// A unit the transport already decoded to text
    Text(String),
}

/// The structured payload every chunk shape converges on
#[derive(Debug, Deserialize)]
struct CompletionPayload {
    /// The text fragment carried by this chunk, absent on bookkeeping
    /// chunks (stop reasons, usage counters)
    completion: Option<String>,
}

/// Normalize one chunk to a plain text fragment
///
/// Shapes are tried in priority order: bytes, wrapped bytes, text. Returns
/// `None` for any chunk that should be skipped; skipping never aborts the
/// stream.
pub fn normalize(chunk: RawChunk) -> Option<String> {
    let payload = match chunk {
        RawChunk::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "skipping chunk: payload is not valid UTF-8");
                return None;
            }
        },
        RawChunk::Wrapped { bytes } => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "skipping chunk: enveloped payload is not valid UTF-8");
                return None;
            }
        },
        RawChunk::Text(text) => text,
    };

    let parsed: CompletionPayload = match serde_json::from_str(&payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "skipping chunk: payload is not a completion object");
            return None;
        }
    };

    match parsed.completion {
        Some(text) if !text.is_empty() => Some(text),
        _ => {
            trace!("skipping chunk with empty or absent completion");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_bytes() {
        let chunk = RawChunk::Bytes(br#"{"completion":"Hello"}"#.to_vec());
        assert_eq!(normalize(chunk), Some("Hello".to_string()));
    }

    #[test]
    fn test_normalize_wrapped() {
        let chunk = RawChunk::Wrapped {
            bytes: br#"{"completion":" world"}"#.to_vec(),
        };
        assert_eq!(normalize(chunk), Some(" world".to_string()));
    }

    #[test]
    fn test_normalize_text() {
        let chunk = RawChunk::Text(r#"{"completion":"!"}"#.to_string());
        assert_eq!(normalize(chunk), Some("!".to_string()));
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let chunk = RawChunk::Text(r#"{"completion":"ok","stop_reason":null}"#.to_string());
        assert_eq!(normalize(chunk), Some("ok".to_string()));
    }

    #[test]
    fn test_empty_completion_skipped() {
        let chunk = RawChunk::Text(r#"{"completion":""}"#.to_string());
        assert_eq!(normalize(chunk), None);
    }

    #[test]
    fn test_absent_completion_skipped() {
        // Final bookkeeping chunks carry a stop reason but no text
        let chunk = RawChunk::Text(r#"{"stop_reason":"stop_sequence"}"#.to_string());
        assert_eq!(normalize(chunk), None);
    }

    #[test]
    fn test_invalid_utf8_skipped() {
        let chunk = RawChunk::Bytes(vec![0xff, 0xfe, 0xfd]);
        assert_eq!(normalize(chunk), None);
    }

    #[test]
    fn test_invalid_json_skipped() {
        let chunk = RawChunk::Text("not json at all".to_string());
        assert_eq!(normalize(chunk), None);
    }

    #[test]
    fn test_concatenation_reproduces_full_text() {
        // Chunks concatenated in arrival order reproduce the provider's
        // full output: none duplicated, none reordered, empties dropped.
        let chunks = vec![
            RawChunk::Bytes(br#"{"completion":"He"}"#.to_vec()),
            RawChunk::Wrapped {
                bytes: br#"{"completion":"llo"}"#.to_vec(),
            },
            RawChunk::Text(r#"{"completion":""}"#.to_string()),
            RawChunk::Text(r#"{"completion":"!"}"#.to_string()),
        ];

        let output: String = chunks.into_iter().filter_map(normalize).collect();
        assert_eq!(output, "Hello!");
    }
}
