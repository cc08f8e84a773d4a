//! Streaming invocation handle and the accumulator it is fed from.
//!
//! A spreadsheet host keeps a streaming cell alive through an invocation
//! object: the engine publishes the text produced so far, and the host may
//! cancel at any time (the user edits or deletes the cell). [`Invocation`]
//! is that object as an explicit interface passed by the caller.

use tokio_util::sync::CancellationToken;

use crate::error::CellGptError;

/// The host-side sink of one streaming call.
pub trait Invocation: Send {
    /// Display `value`, the full text received so far.
    fn publish(&mut self, value: &str);

    /// The stream failed; show an error instead of partial text.
    fn fail(&mut self, _error: &CellGptError) {}

    /// Token the host cancels to stop the stream.
    fn cancellation(&self) -> CancellationToken;
}

/// [`Invocation`] backed by a closure.
///
/// # Examples
///
/// ```
/// use cellgpt::openai::invocation::{CallbackInvocation, Invocation};
///
/// let mut seen = Vec::new();
/// {
///     let mut inv = CallbackInvocation::new(|v: &str| seen.push(v.to_string()));
///     inv.publish("Hel");
///     inv.publish("Hello");
/// }
/// assert_eq!(seen, ["Hel", "Hello"]);
/// ```
pub struct CallbackInvocation<F> {
    sink: F,
    cancel: CancellationToken,
    error: Option<String>,
}

impl<F> CallbackInvocation<F>
where
    F: FnMut(&str) + Send,
{
    /// Wrap `sink` with a fresh cancellation token.
    pub fn new(sink: F) -> Self {
        Self {
            sink,
            cancel: CancellationToken::new(),
            error: None,
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle the host keeps to cancel this invocation later.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Display text of the error passed to [`Invocation::fail`], if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl<F> Invocation for CallbackInvocation<F>
where
    F: FnMut(&str) + Send,
{
    fn publish(&mut self, value: &str) {
        (self.sink)(value);
    }

    fn fail(&mut self, error: &CellGptError) {
        self.error = Some(error.to_string());
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Append-only text buffer owned by a single streaming call.
#[derive(Debug, Default)]
pub struct Accumulator {
    text: String,
}

impl Accumulator {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token and return the full text so far.
    pub fn append(&mut self, token: &str) -> &str {
        self.text.push_str(token);
        &self.text
    }

    /// Text accumulated so far.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume into the final text.
    pub fn into_string(self) -> String {
        self.text
    }
}

/// How a streaming call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Sentinel seen or body exhausted; carries the full text.
    Completed(String),
    /// The host cancelled; carries the text published before cancellation.
    Cancelled(String),
}

impl StreamOutcome {
    /// The accumulated text, whatever the outcome.
    pub fn text(&self) -> &str {
        match self {
            Self::Completed(t) | Self::Cancelled(t) => t,
        }
    }

    /// Whether the stream ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
