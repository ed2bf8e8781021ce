//! Conversation Messages
//!
//! The wire-level data model shared by the relay daemon and the chat
//! client: a conversation is an ordered list of role/content messages,
//! serialized as a bare JSON array.
//!
//! # Design Philosophy
//!
//! Messages are immutable once appended and the conversation is never
//! reordered: the newest element is always the most recent turn. The
//! instruction prompt is *not* part of this model - it is injected at the
//! relay boundary and never appears in a client-visible conversation.

use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Relay-injected instructions or client-side error notices
    System,
    /// The human user
    User,
    /// The model
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,
    /// Message content
    pub content: String,
}

impl Message {
    /// Create a system-role message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user-role message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant-role message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An ordered conversation, serialized as a bare JSON array
///
/// Insertion order is conversation order. The type is append-only by
/// convention: nothing in this crate removes or reorders entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation(
    /// Messages in conversation order, oldest first
    pub Vec<Message>,
);

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the conversation has no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    /// Iterate over messages in conversation order
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }

    /// Content of the most recent user message, if any
    ///
    /// This is the retrieval query for context augmentation.
    #[must_use]
    pub fn last_user_content(&self) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
