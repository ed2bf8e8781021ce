//! Chat Client State
//!
//! Maintains the client-visible conversation as an ordered, append-only
//! list and reassembles streamed replies into the in-flight assistant
//! placeholder.
//!
//! # Placeholder Discipline
//!
//! Each turn appends the user message and an empty assistant placeholder
//! before the network call resolves (optimistic update). While the stream
//! is in flight exactly one placeholder exists - the last entry - and only
//! the stream consumer for that turn mutates it; its content grows
//! monotonically and the entry is never replaced. The submitted payload
//! excludes the placeholder, so an empty trailing entry can never reach
//! the provider.
//!
//! Failures append a system-role error entry. Partially streamed content
//! stays where it is; nothing is rolled back and no error escapes
//! [`ChatClient::send_turn`].

use tracing::warn;

use confab_core::Message;

use crate::decode::StreamDecoder;
use crate::transport::{BodyEvent, TurnTransport};

/// Opening assistant message shown before any turn
pub const GREETING: &str = "Hi, I'm the Confab support assistant. How can I help you today?";

/// The chat client: conversation state plus a turn transport
pub struct ChatClient<T> {
    conversation: Vec<Message>,
    transport: T,
}

impl<T: TurnTransport> ChatClient<T> {
    /// Create a client whose conversation opens with the greeting
    pub fn new(transport: T) -> Self {
        Self {
            conversation: vec![Message::assistant(GREETING)],
            transport,
        }
    }

    /// The client-visible conversation, oldest first
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    /// Submit one turn and stream the reply into the placeholder
    ///
    /// `on_update` fires after every conversation mutation so a UI can
    /// refresh incrementally.
    pub async fn send_turn(&mut self, user_text: &str, mut on_update: impl FnMut(&[Message])) {
        // Optimistic update; the payload snapshot excludes the placeholder
        self.conversation.push(Message::user(user_text));
        let payload = self.conversation.clone();
        self.conversation.push(Message::assistant(""));
        on_update(&self.conversation);

        let mut rx = match self.transport.stream_turn(&payload).await {
            Ok(rx) => rx,
            Err(e) => {
                self.push_error(&e.to_string());
                on_update(&self.conversation);
                return;
            }
        };

        let mut decoder = StreamDecoder::new();
        while let Some(event) = rx.recv().await {
            match event {
                BodyEvent::Data(bytes) => {
                    let text = decoder.push(&bytes);
                    if !text.is_empty() {
                        self.append_to_placeholder(&text);
                        on_update(&self.conversation);
                    }
                }
                BodyEvent::Error(e) => {
                    warn!(error = %e, "reply stream failed");
                    let tail = decoder.finish();
                    if !tail.is_empty() {
                        self.append_to_placeholder(&tail);
                    }
                    self.push_error(&e);
                    on_update(&self.conversation);
                    return;
                }
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            self.append_to_placeholder(&tail);
            on_update(&self.conversation);
        }
    }

    /// Submit one turn and wait for the complete reply
    ///
    /// The non-streaming variant: the placeholder's content is replaced
    /// with the reply body's first text block. The payload rule matches
    /// [`ChatClient::send_turn`].
    pub async fn send_turn_buffered(
        &mut self,
        user_text: &str,
        mut on_update: impl FnMut(&[Message]),
    ) {
        self.conversation.push(Message::user(user_text));
        let payload = self.conversation.clone();
        self.conversation.push(Message::assistant(""));
        on_update(&self.conversation);

        match self.transport.complete_turn(&payload).await {
            Ok(body) => match body["content"][0]["text"].as_str() {
                Some(text) => {
                    let text = text.to_string();
                    if let Some(last) = self.conversation.last_mut() {
                        last.content = text;
                    }
                    on_update(&self.conversation);
                }
                None => {
                    self.push_error("malformed reply body");
                    on_update(&self.conversation);
                }
            },
            Err(e) => {
                self.push_error(&e.to_string());
                on_update(&self.conversation);
            }
        }
    }

    /// Append text to the in-flight placeholder
    ///
    /// The placeholder is the last entry for the whole turn; this is the
    /// turn's single writer.
    fn append_to_placeholder(&mut self, text: &str) {
        if let Some(last) = self.conversation.last_mut() {
            last.content.push_str(text);
        }
    }

    /// Append a system-role error entry without touching the placeholder
    fn push_error(&mut self, message: &str) {
        self.conversation
            .push(Message::system(format!("Error: {message}. Please try again.")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    use confab_core::Role;

    use crate::transport::TransportError;

    /// Scripted transport: replays body events and records payloads
    #[derive(Clone, Default)]
    struct FakeTransport {
        events: Arc<Mutex<Vec<BodyEvent>>>,
        body: serde_json::Value,
        fail_open: bool,
        payloads: Arc<Mutex<Vec<Vec<Message>>>>,
    }

    impl FakeTransport {
        fn with_events(events: Vec<BodyEvent>) -> Self {
            Self {
                events: Arc::new(Mutex::new(events)),
                ..Default::default()
            }
        }

        fn with_fragments(fragments: &[&[u8]]) -> Self {
            Self::with_events(
                fragments
                    .iter()
                    .map(|f| BodyEvent::Data(Bytes::copy_from_slice(f)))
                    .collect(),
            )
        }

        fn last_payload(&self) -> Vec<Message> {
            self.payloads.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl TurnTransport for FakeTransport {
        async fn stream_turn(
            &self,
            conversation: &[Message],
        ) -> Result<mpsc::Receiver<BodyEvent>, TransportError> {
            self.payloads.lock().unwrap().push(conversation.to_vec());
            if self.fail_open {
                return Err(TransportError::Status(500));
            }
            let events: Vec<BodyEvent> = std::mem::take(&mut *self.events.lock().unwrap());
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }

        async fn complete_turn(
            &self,
            conversation: &[Message],
        ) -> Result<serde_json::Value, TransportError> {
            self.payloads.lock().unwrap().push(conversation.to_vec());
            if self.fail_open {
                return Err(TransportError::Status(500));
            }
            Ok(self.body.clone())
        }
    }

    #[tokio::test]
    async fn test_send_turn_appends_user_then_placeholder() {
        let mut client = ChatClient::new(FakeTransport::with_fragments(&[b"ok"]));
        client.send_turn("hello", |_| {}).await;

        let conversation = client.conversation();
        let n = conversation.len();
        assert_eq!(conversation[n - 2], Message::user("hello"));
        assert_eq!(conversation[n - 1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_greeting_opens_the_conversation() {
        let client = ChatClient::new(FakeTransport::default());
        assert_eq!(client.conversation(), &[Message::assistant(GREETING)]);
    }

    #[tokio::test]
    async fn test_fragment_progression_never_skips_or_reorders() {
        let transport = FakeTransport::with_fragments(&[b"He", b"llo", b"!"]);
        let mut client = ChatClient::new(transport);

        let mut snapshots = Vec::new();
        client
            .send_turn("hi", |messages| {
                if let Some(last) = messages.last() {
                    if last.role == Role::Assistant && !last.content.is_empty() {
                        snapshots.push(last.content.clone());
                    }
                }
            })
            .await;

        assert_eq!(snapshots, vec!["He", "Hello", "Hello!"]);
    }

    #[tokio::test]
    async fn test_payload_excludes_empty_placeholder() {
        let transport = FakeTransport::with_fragments(&[b"ok"]);
        let mut client = ChatClient::new(transport.clone());
        client.send_turn("question", |_| {}).await;

        let payload = transport.last_payload();
        assert_eq!(
            payload.last(),
            Some(&Message::user("question")),
            "the in-flight placeholder must not reach the relay"
        );
        assert!(payload.iter().all(|m| !(m.role == Role::Assistant && m.content.is_empty())));
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_partial_content() {
        let transport = FakeTransport::with_events(vec![
            BodyEvent::Data(Bytes::from_static(b"partial answer")),
            BodyEvent::Error("connection reset".to_string()),
        ]);
        let mut client = ChatClient::new(transport);
        client.send_turn("hi", |_| {}).await;

        let conversation = client.conversation();
        let n = conversation.len();
        assert_eq!(
            conversation[n - 2],
            Message::assistant("partial answer"),
            "already-streamed content must be preserved"
        );
        assert_eq!(conversation[n - 1].role, Role::System);
        assert!(conversation[n - 1].content.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_open_failure_appends_error_entry() {
        let transport = FakeTransport {
            fail_open: true,
            ..Default::default()
        };
        let mut client = ChatClient::new(transport);
        client.send_turn("hi", |_| {}).await;

        let last = client.conversation().last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, "Error: HTTP error! status: 500. Please try again.");
    }

    #[tokio::test]
    async fn test_multibyte_scalar_split_across_body_fragments() {
        // "café" with the é split across two reads
        let transport = FakeTransport::with_fragments(&[b"caf", &[0xC3], &[0xA9]]);
        let mut client = ChatClient::new(transport);
        client.send_turn("hi", |_| {}).await;

        let n = client.conversation().len();
        assert_eq!(client.conversation()[n - 1], Message::assistant("café"));
    }

    #[tokio::test]
    async fn test_buffered_turn_replaces_placeholder() {
        let transport = FakeTransport {
            body: serde_json::json!({
                "content": [{ "type": "text", "text": "full reply" }],
            }),
            ..Default::default()
        };
        let mut client = ChatClient::new(transport.clone());
        client.send_turn_buffered("hi", |_| {}).await;

        let last = client.conversation().last().unwrap();
        assert_eq!(last, &Message::assistant("full reply"));
        assert_eq!(
            transport.last_payload().last(),
            Some(&Message::user("hi"))
        );
    }

    #[tokio::test]
    async fn test_buffered_turn_malformed_body() {
        let transport = FakeTransport {
            body: serde_json::json!({ "unexpected": true }),
            ..Default::default()
        };
        let mut client = ChatClient::new(transport);
        client.send_turn_buffered("hi", |_| {}).await;

        let last = client.conversation().last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.contains("malformed reply body"));
    }
}
