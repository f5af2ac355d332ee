//! Line-mode chat on plain stdin/stdout
//!
//! Same turn handling as the terminal UI, without the UI: type at the
//! `:> ` prompt, replies stream straight to stdout, `exit` leaves.

use std::io::Write;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use crate::config::Config;
use crate::render::MessageClass;
use crate::session::ChatSession;
use crate::stream::ROLE_PREFIX;
use crate::transport::ChatClient;

const PROMPT: &str = ":> ";

/// Tracks what has been written for the current reply.
///
/// The reply buffer can still change at its tail (a half-received marker)
/// or head (a half-received role prefix), so only the part that can no
/// longer be rewritten is echoed.
#[derive(Debug, Default)]
struct EchoState {
    printed: String,
}

impl EchoState {
    /// Return the text to write now for the buffer `text`
    fn advance(&mut self, text: &str) -> Option<String> {
        let stable = stable_prefix(text);
        let delta = stable.strip_prefix(self.printed.as_str())?;
        if delta.is_empty() {
            return None;
        }
        let delta = delta.to_string();
        self.printed.push_str(&delta);
        Some(delta)
    }

    /// Text still owed once the stream is over
    fn finish(self, text: &str) -> Option<String> {
        match text.strip_prefix(self.printed.as_str()) {
            Some("") => None,
            Some(rest) => Some(rest.to_string()),
            None => Some(format!("\n{}", text)),
        }
    }
}

fn stable_prefix(text: &str) -> &str {
    if text.len() < ROLE_PREFIX.len() && ROLE_PREFIX.starts_with(text) {
        return "";
    }
    if let Some(idx) = text.rfind('|') {
        let tail = &text[idx + 1..];
        if tail.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return &text[..idx];
        }
    }
    text
}

/// The `Error:` line a failed turn left behind, if the last turn failed
fn turn_error(session: &ChatSession) -> Option<&str> {
    session
        .surface
        .last()
        .filter(|n| n.class == MessageClass::AssistantMessage && n.text.starts_with("Error:"))
        .map(|n| n.text.as_str())
}

fn print_flush(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "{}", text);
    let _ = stdout.flush();
}

pub async fn run(config: &Config) -> Result<()> {
    let client = ChatClient::from_config(config);
    let mut session = ChatSession::new(config.max_history_tokens);

    println!("Chatting with {}. Type 'exit' to quit.", client.endpoint());
    tracing::info!(endpoint = %client.endpoint(), "repl session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_flush(PROMPT);
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        session.set_input(&line);
        let Some(turn) = session.submit() else {
            continue;
        };

        let mut echo = EchoState::default();
        let result = client
            .stream_chat(&turn.messages, |text| {
                if let Some(delta) = echo.advance(text) {
                    print_flush(&delta);
                }
            })
            .await;

        match &result {
            Ok(reply) => {
                if let Some(rest) = echo.finish(reply) {
                    print_flush(&rest);
                }
                println!();
            }
            Err(_) => println!(),
        }

        session.finish_turn(result);
        if let Some(error) = turn_error(&session) {
            println!("{}", error);
        }
    }

    tracing::info!(messages = session.conversation().len(), "repl session ended");
    Ok(())
}
