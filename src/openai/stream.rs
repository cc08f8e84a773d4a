//! Streaming token pipeline.
//!
//! ```text
//! body chunks ──▶ DataLineParser ──▶ StreamChunk::parse ──▶ tokens ──▶ Accumulator ──▶ Invocation
//! ```
//!
//! [`token_stream`] turns a response body into a lazy, finite stream of
//! delta tokens. [`drive_invocation`] folds those tokens into an
//! [`Accumulator`] and publishes every intermediate value to the host.
//!
//! The pipeline is generic over the byte stream so it can be fed from a
//! `reqwest` body or from a canned chunk list in tests.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{CellGptError, Result};
use crate::openai::invocation::{Accumulator, Invocation, StreamOutcome};
use crate::openai::response::StreamChunk;
use crate::openai::sse::{DataLineParser, StreamEvent};

/// A boxed stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A boxed stream of delta tokens.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Owns the response body and releases it exactly once.
///
/// Released explicitly when the sentinel is seen, on error, or on
/// cancellation; dropping the reader releases it too if that has not
/// happened yet.
pub struct BodyReader {
    body: Option<ByteStream>,
}

impl BodyReader {
    /// Take ownership of a response body.
    pub fn new(body: ByteStream) -> Self {
        Self { body: Some(body) }
    }

    /// Read the next chunk. Returns `None` once released or exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        match self.body.as_mut() {
            Some(body) => body.next().await,
            None => None,
        }
    }

    /// Drop the underlying body. Returns `true` only on the first call.
    pub fn release(&mut self) -> bool {
        match self.body.take() {
            Some(body) => {
                drop(body);
                tracing::debug!("stream body released");
                true
            }
            None => false,
        }
    }

    /// Whether the body has been released.
    pub fn is_released(&self) -> bool {
        self.body.is_none()
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        self.release();
    }
}

/// Internal state for the token stream.
struct TokenState {
    reader: BodyReader,
    parser: DataLineParser,
    pending: VecDeque<Result<String>>,
    cancel: CancellationToken,
    finished: bool,
}

impl TokenState {
    /// Queue the tokens carried by `events`. Stops at the first bad payload.
    fn absorb(&mut self, events: Vec<StreamEvent>) {
        for event in events {
            match event {
                StreamEvent::Done => {
                    tracing::debug!("stream sentinel received");
                    self.stop();
                    return;
                }
                StreamEvent::Data(payload) => match StreamChunk::parse(&payload) {
                    Ok(chunk) => {
                        if let Some(token) = chunk.token() {
                            self.pending.push_back(Ok(token.to_string()));
                        }
                    }
                    Err(e) => {
                        self.fail(e);
                        return;
                    }
                },
            }
        }
    }

    fn fail(&mut self, err: CellGptError) {
        tracing::warn!(error = %err, "stream aborted");
        self.pending.push_back(Err(err));
        self.stop();
    }

    fn stop(&mut self) {
        self.finished = true;
        self.reader.release();
    }
}

/// Turn a response body into a stream of delta tokens.
///
/// The stream ends after the `[DONE]` sentinel, when the body is exhausted,
/// or when `cancel` fires; it yields one `Err` and ends on the first
/// transport or parse failure. Cancellation is checked before every chunk
/// read and raced against a pending read.
pub fn token_stream(body: ByteStream, cancel: CancellationToken) -> TokenStream {
    let state = TokenState {
        reader: BodyReader::new(body),
        parser: DataLineParser::new(),
        pending: VecDeque::new(),
        cancel,
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            if state.cancel.is_cancelled() {
                tracing::debug!("stream cancelled before chunk read");
                state.stop();
                return None;
            }

            let cancel = state.cancel.clone();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = state.reader.next_chunk() => Some(next),
            };
            let Some(next) = read else {
                tracing::debug!("stream cancelled during chunk read");
                state.stop();
                return None;
            };

            match next {
                Some(Ok(chunk)) => match state.parser.push(&chunk) {
                    Ok(events) => state.absorb(events),
                    Err(e) => state.fail(e),
                },
                Some(Err(e)) => state.fail(e),
                None => {
                    match state.parser.flush() {
                        Ok(Some(event)) => state.absorb(vec![event]),
                        Ok(None) => {}
                        Err(e) => state.fail(e),
                    }
                    state.stop();
                }
            }
        }
    }))
}

/// Fold `tokens` into an accumulator, publishing each new value.
///
/// Every published value extends the previous one. On failure the error is
/// passed to [`Invocation::fail`] and returned; on cancellation the text
/// published so far is returned as [`StreamOutcome::Cancelled`].
pub async fn drive_invocation<I>(mut tokens: TokenStream, invocation: &mut I) -> Result<StreamOutcome>
where
    I: Invocation + ?Sized,
{
    let cancel = invocation.cancellation();
    let mut acc = Accumulator::new();
    let mut published = 0usize;

    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) => {
                if cancel.is_cancelled() {
                    break;
                }
                invocation.publish(acc.append(&token));
                published += 1;
            }
            Err(e) => {
                invocation.fail(&e);
                return Err(e);
            }
        }
    }
    drop(tokens);

    tracing::debug!(published, chars = acc.as_str().chars().count(), "stream finished");
    if cancel.is_cancelled() {
        Ok(StreamOutcome::Cancelled(acc.into_string()))
    } else {
        Ok(StreamOutcome::Completed(acc.into_string()))
    }
}
