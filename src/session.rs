//! One chat session: history, input line, message list and turn state
//!
//! A turn moves `Idle -> AwaitingResponse -> Idle`. Both the send button and
//! the Enter key go through [`ChatSession::submit`], which refuses to start a
//! second turn while one is in flight.

use crate::history::{Conversation, Message};
use crate::render::{MessageClass, RenderSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// A turn that has been accepted and now needs to go over the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub messages: Vec<Message>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug)]
pub struct ChatSession {
    conversation: Conversation,
    pub surface: RenderSurface,
    input: String,
    cursor: usize, // cursor position in input, in chars
    state: TurnState,
    // Input text at the moment the in-flight turn was submitted
    submitted_input: Option<String>,
    max_history_tokens: usize,
}

impl ChatSession {
    pub fn new(max_history_tokens: usize) -> Self {
        Self {
            conversation: Conversation::new(),
            surface: RenderSurface::new(),
            input: String::new(),
            cursor: 0,
            state: TurnState::Idle,
            submitted_input: None,
            max_history_tokens,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Start a turn from the current input.
    ///
    /// Returns `None` when the trimmed input is empty or a response is still
    /// streaming. Otherwise the user message is rendered, appended and the
    /// history truncated before the messages to send are handed back.
    pub fn submit(&mut self) -> Option<PendingTurn> {
        if self.state == TurnState::AwaitingResponse {
            tracing::debug!("submit ignored, a response is still in flight");
            return None;
        }

        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }

        self.surface.append_message(&message, MessageClass::UserMessage);
        self.conversation.push(Message::user(message));
        self.conversation.truncate(self.max_history_tokens);

        self.state = TurnState::AwaitingResponse;
        self.submitted_input = Some(self.input.clone());
        self.surface.set_waiting(true);

        tracing::info!(
            messages = self.conversation.len(),
            tokens = self.conversation.token_count(),
            "turn submitted"
        );

        Some(PendingTurn {
            messages: self.conversation.messages().to_vec(),
        })
    }

    /// Show the reply streamed so far
    pub fn stream_update(&mut self, text: &str) {
        if self.state != TurnState::AwaitingResponse {
            return;
        }
        self.surface.update_streaming(text);
    }

    /// Close the in-flight turn.
    ///
    /// A reply is appended to the history. A failure is rendered once as an
    /// `Error:` message and leaves the history alone.
    pub fn finish_turn(&mut self, result: anyhow::Result<String>) {
        if self.state != TurnState::AwaitingResponse {
            return;
        }

        match result {
            Ok(reply) => {
                if reply.trim().is_empty() {
                    tracing::warn!("empty reply, nothing added to history");
                } else {
                    self.conversation.push(Message::assistant(reply));
                }
            }
            Err(err) => {
                tracing::warn!(error = %format!("{:#}", err), "chat turn failed");
                self.surface
                    .append_message(&format!("Error: {}", err), MessageClass::AssistantMessage);
            }
        }

        // Only clear what was sent; text typed while waiting stays
        if self.submitted_input.take().as_deref() == Some(self.input.as_str()) {
            self.input.clear();
            self.cursor = 0;
        }

        self.state = TurnState::Idle;
        self.surface.set_waiting(false);
    }

    // Input editing

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor = self.input.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }
}
