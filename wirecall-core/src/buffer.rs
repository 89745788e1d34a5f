//! Stream framing: splitting a byte stream into complete JSON messages
//!
//! A stream transport delivers bytes at arbitrary boundaries: one read may
//! carry half a message, or three messages and the start of a fourth.
//! [`MessageBuffer`] reassembles complete JSON object texts from that stream
//! without parsing JSON, by tracking brace depth and quote state character
//! by character.
//!
//! # Scanning rules
//!
//! - A `"` or `'` not preceded by a backslash enters quote state; the
//!   matching character under the same rule exits it.
//! - Outside quotes, `{` increments brace depth and `}` decrements it.
//! - When depth returns to 0 after a decrement, everything consumed since
//!   the previous boundary (closing brace included) is emitted as one
//!   message.
//! - A `}` with no matching opener at top level is noise: everything
//!   consumed so far is silently discarded and depth resets to 0. This
//!   recovers from stray leading fragments rather than failing.
//!
//! No JSON validation happens here. Any brace-balanced text passes through
//! verbatim, including invalid JSON, for higher layers to reject.

use crate::error::{Error, Result};

/// Callback invoked synchronously for each completed message, in order
pub type CompletionFn = Box<dyn FnMut(&str) + Send>;

/// Reassembles complete JSON object texts from arbitrarily chunked input
///
/// State (partial text, brace depth, quote state, trailing-escape flag)
/// carries over between [`append`](Self::append) calls, so chunks may split
/// anywhere, including between a backslash and the character it escapes.
pub struct MessageBuffer {
    messages: Vec<String>,
    on_message: Option<CompletionFn>,
    partial: String,
    depth: u32,
    in_quote: bool,
    quote_char: char,
    prev_backslash: bool,
}

impl MessageBuffer {
    /// Create a buffer that only retains completed messages
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            on_message: None,
            partial: String::new(),
            depth: 0,
            in_quote: false,
            quote_char: '"',
            prev_backslash: false,
        }
    }

    /// Create a buffer with a per-completion callback.
    ///
    /// The callback fires once per emitted message, in emission order, from
    /// within the `append` call that completed it. Messages are retained
    /// as well.
    pub fn with_handler(handler: impl FnMut(&str) + Send + 'static) -> Self {
        let mut buffer = Self::new();
        buffer.on_message = Some(Box::new(handler));
        buffer
    }

    /// Ingest a chunk of text.
    ///
    /// Zero, one, or many complete messages may result from a single call;
    /// a trailing partial message carries over to the next call.
    pub fn append(&mut self, chunk: &str) {
        let mut start = 0;

        for (pos, ch) in chunk.char_indices() {
            let escaped = self.prev_backslash;

            if (ch == '"' || ch == '\'') && !escaped {
                if !self.in_quote {
                    self.in_quote = true;
                    self.quote_char = ch;
                } else if ch == self.quote_char {
                    self.in_quote = false;
                }
            } else if ch == '{' && !self.in_quote {
                self.depth += 1;
            } else if ch == '}' && !self.in_quote {
                if self.depth > 1 {
                    self.depth -= 1;
                } else if self.depth == 1 {
                    self.depth = 0;
                    let end = pos + ch.len_utf8();
                    let mut message = std::mem::take(&mut self.partial);
                    message.push_str(&chunk[start..end]);
                    start = end;

                    if let Some(handler) = &mut self.on_message {
                        handler(&message);
                    }
                    self.messages.push(message);
                } else {
                    // Unmatched closer at top level: drop the noise consumed
                    // so far and carry on from the next character.
                    let dropped = self.partial.len() + (pos - start) + ch.len_utf8();
                    tracing::debug!(dropped, "discarding unframed input before stray closer");
                    self.partial.clear();
                    start = pos + ch.len_utf8();
                }
            }

            self.prev_backslash = ch == '\\';
        }

        self.partial.push_str(&chunk[start..]);
    }

    /// Ingest a chunk of UTF-8 encoded bytes
    pub fn append_bytes(&mut self, chunk: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(chunk)
            .map_err(|e| Error::Message(format!("invalid UTF-8 in stream: {}", e)))?;
        self.append(text);
        Ok(())
    }

    /// Completed messages accumulated so far
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Take all completed messages, leaving the accumulator empty.
    ///
    /// Partial-message state is unaffected.
    pub fn drain_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
