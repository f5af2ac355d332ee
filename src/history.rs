//! Conversation history and token-budget truncation
//!
//! A "token" here is a whitespace-delimited word, not a model vocabulary unit.
//! Truncation keeps the most recent tokens of the flattened history and writes
//! them back into the messages they came from.

use serde::{Deserialize, Serialize};

/// Default token budget applied before every request
pub const DEFAULT_MAX_TOKENS: usize = 400;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A chat message as it goes over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep only the last `max_tokens` tokens of the history.
///
/// Within budget the history comes back untouched. Over budget, tokens are
/// dropped from the front of the flattened sequence; every surviving message
/// is rebuilt from its own remaining tokens joined by single spaces, and
/// messages left with nothing are removed. Order is never changed.
pub fn truncate_history(messages: &[Message], max_tokens: usize) -> Vec<Message> {
    let total: usize = messages.iter().map(|m| count_tokens(&m.content)).sum();
    if total <= max_tokens {
        return messages.to_vec();
    }

    let mut to_drop = total - max_tokens;
    messages
        .iter()
        .filter_map(|message| {
            let tokens: Vec<&str> = message.content.split_whitespace().collect();
            let skip = to_drop.min(tokens.len());
            to_drop -= skip;

            let content = tokens[skip..].join(" ");
            if content.trim().is_empty() {
                None
            } else {
                Some(Message {
                    role: message.role,
                    content,
                })
            }
        })
        .collect()
}

/// Ordered message history owned by a single chat session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.messages.iter().map(|m| count_tokens(&m.content)).sum()
    }

    /// Apply [`truncate_history`] in place
    pub fn truncate(&mut self, max_tokens: usize) {
        let before = self.token_count();
        if before <= max_tokens {
            return;
        }
        self.messages = truncate_history(&self.messages, max_tokens);
        tracing::debug!(
            before,
            after = self.token_count(),
            messages = self.messages.len(),
            "truncated conversation history"
        );
    }
}
