//! Incremental UTF-8 Decoding
//!
//! The relay's streamed reply is UTF-8 text, but the transport delivers it
//! in arbitrary byte fragments: a multi-byte scalar can be split across two
//! reads. The decoder carries the incomplete tail of each fragment into the
//! next call so no scalar is ever lost or mangled at a fragment boundary.

/// Streaming UTF-8 decoder with carry-over for split sequences
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Incomplete trailing bytes of the previous fragment
    carry: Vec<u8>,
}

impl StreamDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next fragment, returning all newly completed text
    ///
    /// Invalid bytes decode to U+FFFD; an incomplete trailing sequence is
    /// held back until the next call.
    pub fn push(&mut self, input: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(input);

        let mut out = String::new();
        let mut rest: &[u8] = &data;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    // Everything up to the error is valid
                    out.push_str(&String::from_utf8_lossy(&rest[..e.valid_up_to()]));
                    match e.error_len() {
                        Some(n) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[e.valid_up_to() + n..];
                        }
                        None => {
                            // Incomplete sequence at the end: carry it over
                            self.carry = rest[e.valid_up_to()..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Finish the stream, flushing any dangling partial sequence
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            String::new()
        } else {
            self.carry.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}
