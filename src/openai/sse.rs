//! Line-delimited data-event decoder for streaming responses.
//!
//! Converts raw body chunks into [`StreamEvent`]s. The protocol is a subset
//! of Server-Sent Events: every meaningful line starts with `data:`, and the
//! literal `[DONE]` payload ends the stream.
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Lines are split on the raw `\n` byte before any UTF-8 decoding. A newline
//! byte never occurs inside a multi-byte sequence, so a character split
//! across two chunks stays in the line buffer until its line is complete.
//!
//! # Examples
//!
//! ```
//! use cellgpt::openai::sse::{DataLineParser, StreamEvent};
//!
//! let mut parser = DataLineParser::new();
//! assert!(parser.push(b"data: hel").map(|e| e.is_empty()).unwrap_or(false));
//!
//! let events = parser.push(b"lo\ndata: [DONE]\n").unwrap_or_default();
//! assert_eq!(events, vec![StreamEvent::Data("hello".into()), StreamEvent::Done]);
//! ```

use crate::error::{CellGptError, Result};

/// Prefix that marks a data-event line.
pub const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Longest line accepted before a newline arrives.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One decoded data event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A payload to be parsed as a JSON delta chunk.
    Data(String),
    /// The terminal sentinel.
    Done,
}

/// Incremental decoder from body bytes to [`StreamEvent`]s.
///
/// Feed chunks via [`push`](Self::push) and call [`flush`](Self::flush) when
/// the body ends. Once [`StreamEvent::Done`] has been produced the parser is
/// finished: the rest of that chunk and every later chunk are discarded.
#[derive(Debug, Default)]
pub struct DataLineParser {
    line_buffer: Vec<u8>,
    done: bool,
}

impl DataLineParser {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Push a chunk of body bytes.
    ///
    /// Returns the events completed by this chunk, in arrival order.
    ///
    /// # Errors
    /// Returns [`CellGptError::ParseError`] when a data line is not valid UTF-8
    /// or a line grows past [`MAX_LINE_BYTES`] without a newline.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>> {
        let mut events = Vec::new();
        if self.done {
            return Ok(events);
        }

        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.line_buffer.extend_from_slice(&rest[..pos]);
            rest = &rest[pos + 1..];

            let line = std::mem::take(&mut self.line_buffer);
            if let Some(event) = decode_line(&line)? {
                let finished = event == StreamEvent::Done;
                events.push(event);
                if finished {
                    self.finish();
                    return Ok(events);
                }
            }
        }
        if self.line_buffer.len() + rest.len() > MAX_LINE_BYTES {
            self.finish();
            return Err(CellGptError::ParseError(format!(
                "stream line exceeds {MAX_LINE_BYTES} bytes without a newline"
            )));
        }
        self.line_buffer.extend_from_slice(rest);

        Ok(events)
    }

    /// Decode whatever is left in the line buffer when the body ends.
    ///
    /// # Errors
    /// Returns [`CellGptError::ParseError`] when the trailing line is not valid UTF-8.
    pub fn flush(&mut self) -> Result<Option<StreamEvent>> {
        if self.done || self.line_buffer.is_empty() {
            return Ok(None);
        }
        let line = std::mem::take(&mut self.line_buffer);
        let event = decode_line(&line)?;
        if event == Some(StreamEvent::Done) {
            self.finish();
        }
        Ok(event)
    }

    fn finish(&mut self) {
        self.done = true;
        self.line_buffer.clear();
    }
}

/// Turn one complete line into an event, if it is a data line.
fn decode_line(line: &[u8]) -> Result<Option<StreamEvent>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let trimmed = line.trim_ascii_start();
    if !trimmed.starts_with(DATA_PREFIX.as_bytes()) {
        return Ok(None);
    }

    let text = std::str::from_utf8(trimmed).map_err(|e| {
        CellGptError::ParseError(format!("stream line is not valid UTF-8: {e}"))
    })?;
    let payload = &text[DATA_PREFIX.len()..];
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload.trim() == DONE_SENTINEL {
        Ok(Some(StreamEvent::Done))
    } else {
        Ok(Some(StreamEvent::Data(payload.to_string())))
    }
}
