//! Incremental decoding of the chat endpoint's text stream
//!
//! The endpoint answers with plain UTF-8 text split into arbitrary byte
//! chunks. Upstream model markers such as `|im_start|` / `|im_end|` and a
//! leading `assistant: ` role prefix are removed before display.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use futures_util::{Stream, StreamExt};
use regex::Regex;

pub const ROLE_PREFIX: &str = "assistant: ";

fn sentinel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\|\w+?_(?:start|end)\|").expect("sentinel pattern is valid"))
}

/// Streaming UTF-8 decoder that carries incomplete sequences across chunks
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any held-over bytes) as possible.
    /// Invalid sequences become U+FFFD; a truncated sequence at the end is
    /// kept for the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let data = std::mem::take(&mut self.pending);
        let mut rest = data.as_slice();
        let mut out = String::with_capacity(rest.len());

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid_up_to + len..];
                        }
                        None => {
                            self.pending = rest[valid_up_to..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is still held; an unfinished sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Accumulator for the assistant turn currently being streamed
#[derive(Debug, Default)]
pub struct StreamBuffer {
    text: String,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a decoded chunk and return the whole cleaned buffer.
    ///
    /// Markers are stripped from the accumulated text rather than the chunk
    /// so that one split across two chunks is still removed.
    pub fn push(&mut self, chunk: &str) -> &str {
        self.text.push_str(&chunk.replace('\n', " "));

        let pattern = sentinel_pattern();
        if pattern.is_match(&self.text) {
            self.text = pattern.replace_all(&self.text, "").into_owned();
        }
        if self.text.starts_with(ROLE_PREFIX) {
            self.text.drain(..ROLE_PREFIX.len());
        }

        &self.text
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Drive a byte stream to completion.
///
/// `on_update` receives the full cleaned buffer after every chunk; the
/// returned string is the final buffer.
pub async fn accumulate<S, B, E, F>(stream: S, mut on_update: F) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
    F: FnMut(&str),
{
    futures_util::pin_mut!(stream);

    let mut decoder = Utf8Decoder::new();
    let mut buffer = StreamBuffer::new();
    let mut chunks = 0usize;

    while let Some(item) = stream.next().await {
        let bytes = item
            .map_err(Into::<anyhow::Error>::into)
            .context("failed to read response body")?;
        chunks += 1;

        let text = decoder.decode(bytes.as_ref());
        if text.is_empty() {
            continue;
        }
        tracing::trace!(chunk = %text, "received chunk");
        on_update(buffer.push(&text));
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        on_update(buffer.push(&tail));
    }

    tracing::debug!(chunks, chars = buffer.as_str().chars().count(), "stream finished");
    Ok(buffer.into_string())
}
