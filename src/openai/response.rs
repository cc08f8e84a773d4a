//! Typed response schemas for the Chat Completions API.
//!
//! Bodies are validated at the parse boundary: anything that does not match
//! becomes a [`CellGptError::ParseError`] instead of a missing-field panic
//! further down.

use serde::{Deserialize, Serialize};

use crate::error::{CellGptError, Result};
use crate::openai::message::Role;

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// The assistant message inside a choice. Content is `null` for tool calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
}

/// One generated alternative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
}

/// A non-streaming chat-completion response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub created: Option<u64>,
    pub model: String,
    #[serde(default)]
    pub usage: Option<Usage>,
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    /// Parse a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| CellGptError::ParseError(format!("invalid completion response: {e}")))
    }

    /// The text of the first choice, which is what a cell displays.
    ///
    /// # Errors
    /// Returns [`CellGptError::ParseError`] when there are no choices or the
    /// first choice has no text content.
    pub fn first_text(&self) -> Result<&str> {
        let choice = self
            .choices
            .first()
            .ok_or_else(|| CellGptError::ParseError("completion response has no choices".into()))?;
        choice.message.content.as_deref().ok_or_else(|| {
            CellGptError::ParseError("first choice has no text content".into())
        })
    }
}

/// Incremental content carried by one streaming event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
}

/// One choice inside a streaming event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
}

/// The JSON payload of a streaming `data:` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamChunk {
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// Parse a `data:` payload.
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| {
            CellGptError::ParseError(format!("invalid stream event {}: {e}", excerpt(payload)))
        })
    }

    /// Non-empty token text of the first choice, if any.
    pub fn token(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Short, char-boundary-safe preview of a payload for error messages.
fn excerpt(payload: &str) -> String {
    const MAX_CHARS: usize = 80;
    let mut chars = payload.chars();
    let head: String = chars.by_ref().take(MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("'{head}…'")
    } else {
        format!("'{head}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = r#"{
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "gpt-4-0613",
        "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21},
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello there"},
            "finish_reason": "stop"
        }]
    }"#;

    // ── CompletionResponse ────────────────────────────────────

    #[test]
    fn parse_full_response() {
        let parsed = CompletionResponse::from_slice(FULL_RESPONSE.as_bytes());
        let response = match parsed {
            Ok(r) => r,
            Err(e) => unreachable!("valid response: {e}"),
        };
        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.model, "gpt-4-0613");
        assert_eq!(
            response.usage,
            Some(Usage {
                prompt_tokens: 9,
                completion_tokens: 12,
                total_tokens: 21
            })
        );
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(matches!(response.first_text(), Ok("Hello there")));
    }

    #[test]
    fn usage_is_optional() {
        let body = r#"{"id":"x","model":"gpt-4","choices":[{"message":{"role":"assistant","content":"ok"}}]}"#;
        let parsed = CompletionResponse::from_slice(body.as_bytes());
        assert!(matches!(parsed, Ok(ref r) if r.usage.is_none()));
    }

    #[test]
    fn no_choices_is_parse_error() {
        let body = r#"{"id":"x","model":"gpt-4","choices":[]}"#;
        let parsed = CompletionResponse::from_slice(body.as_bytes());
        assert!(matches!(
            parsed.as_ref().map(|r| r.first_text()),
            Ok(Err(CellGptError::ParseError(_)))
        ));
    }

    #[test]
    fn null_content_is_parse_error() {
        let body = r#"{"id":"x","model":"gpt-4","choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed = CompletionResponse::from_slice(body.as_bytes());
        assert!(matches!(
            parsed.as_ref().map(|r| r.first_text()),
            Ok(Err(CellGptError::ParseError(_)))
        ));
    }

    #[test]
    fn malformed_body_is_parse_error() {
        for body in ["not json", r#"{"id":"x"}"#, r#"{"choices":"nope"}"#] {
            assert!(matches!(
                CompletionResponse::from_slice(body.as_bytes()),
                Err(CellGptError::ParseError(_))
            ));
        }
    }

    // ── StreamChunk ───────────────────────────────────────────

    #[test]
    fn chunk_token() {
        let chunk = StreamChunk::parse(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#);
        assert!(matches!(chunk.as_ref().map(|c| c.token()), Ok(Some("Hel"))));
    }

    #[test]
    fn chunk_role_only_has_no_token() {
        let chunk = StreamChunk::parse(r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#);
        assert!(matches!(chunk.as_ref().map(|c| c.token()), Ok(None)));
    }

    #[test]
    fn chunk_empty_content_has_no_token() {
        let chunk = StreamChunk::parse(r#"{"choices":[{"delta":{"content":""}}]}"#);
        assert!(matches!(chunk.as_ref().map(|c| c.token()), Ok(None)));
    }

    #[test]
    fn chunk_finish_reason() {
        let chunk = StreamChunk::parse(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        match chunk {
            Ok(c) => {
                assert_eq!(c.choices[0].finish_reason.as_deref(), Some("stop"));
                assert!(c.token().is_none());
            }
            Err(e) => unreachable!("valid chunk: {e}"),
        }
    }

    #[test]
    fn chunk_with_no_choices_has_no_token() {
        let chunk = StreamChunk::parse(r#"{"choices":[]}"#);
        assert!(matches!(chunk.as_ref().map(|c| c.token()), Ok(None)));
    }

    #[test]
    fn chunk_missing_shape_is_parse_error() {
        for payload in [
            "{broken",
            r#"{"id":"x"}"#,
            r#"{"choices":[{"index":0}]}"#,
            r#"{"error":{"message":"overloaded"}}"#,
        ] {
            assert!(
                matches!(StreamChunk::parse(payload), Err(CellGptError::ParseError(_))),
                "{payload} should be rejected"
            );
        }
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let short = excerpt(&long);
        assert!(short.ends_with("…'"));
        assert_eq!(short.chars().filter(|c| *c == 'é').count(), 80);
    }
}
