//! LLM conversation state
//!
//! A [`Conversation`] is append-only for the lifetime of one Generation
//! Session. What is actually sent to the completion service may be a window
//! over it, see [`Conversation::window`].

use serde::{Deserialize, Serialize};

/// System instruction every completion backend prepends to a request
pub const SYSTEM_INSTRUCTION: &str = "You write clean, idiomatic Jest tests.";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed instruction from the tool
    System,
    /// Prompt or feedback from the tool
    User,
    /// Completion returned by the model
    Assistant,
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[inline]
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only message history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    #[inline]
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages to send for the next request
    ///
    /// The anchor (every message before the first assistant reply) is always
    /// kept. An exchange is one assistant reply plus the user turns that
    /// follow it. With `Some(k)`, the last `k` exchanges follow the anchor;
    /// the newest exchange is always included so a pending repair request is
    /// never dropped. `None` sends everything.
    #[must_use]
    pub fn window(&self, history_limit: Option<usize>) -> Vec<Message> {
        let Some(limit) = history_limit else {
            return self.messages.clone();
        };

        let anchor_len = self
            .messages
            .iter()
            .position(|m| m.role == Role::Assistant)
            .unwrap_or(self.messages.len());
        let tail = &self.messages[anchor_len..];
        let exchange_starts: Vec<usize> = tail
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::Assistant)
            .map(|(i, _)| i)
            .collect();
        let from = exchange_starts
            .len()
            .checked_sub(limit.max(1))
            .map_or(0, |i| exchange_starts[i]);

        let mut window = Vec::with_capacity(anchor_len + tail.len() - from);
        window.extend_from_slice(&self.messages[..anchor_len]);
        window.extend_from_slice(&tail[from..]);
        window
    }
}
