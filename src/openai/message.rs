//! Chat message types and the message builder.
//!
//! Provides the [`ChatMessage`], [`Role`], and [`ConversationTurn`] types
//! used to represent the conversation sent to the chat-completion API, and
//! [`build_messages`], which lays them out in the order the API expects:
//! system first, then history, then the current prompt.
//!
//! # Examples
//!
//! ```
//! use cellgpt::openai::message::{build_messages, ConversationTurn, Role};
//!
//! let history = vec![ConversationTurn::new("Hi", "Hello!")];
//! let messages = build_messages("You are a helpful assistant.", &history, Some("What is 2+2?"));
//! assert_eq!(messages.len(), 4);
//! assert_eq!(messages[0].role, Role::System);
//! assert_eq!(messages[3].content, "What is 2+2?");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CellGptError, Result};

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
    /// Function result; the only role that carries a `name`.
    Function,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// A single message in a chat-completion request.
///
/// `name` is present only for [`Role::Function`]. The constructors enforce
/// that, and deserialization rejects payloads that break it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage")]
pub struct ChatMessage {
    /// Who sent this message.
    pub role: Role,
    /// Function name, for function messages only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The message text.
    pub content: String,
}

/// Unvalidated shape read off the wire.
#[derive(Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    name: Option<String>,
    content: String,
}

impl TryFrom<WireMessage> for ChatMessage {
    type Error = String;

    fn try_from(raw: WireMessage) -> std::result::Result<Self, Self::Error> {
        match (raw.role, raw.name) {
            (Role::Function, None) => Err("function message is missing 'name'".into()),
            (Role::Function, Some(name)) => Ok(Self::function(name, raw.content)),
            (role, Some(_)) => Err(format!("'name' is only allowed on function messages, not {role}")),
            (role, None) => Ok(Self::text(role, raw.content)),
        }
    }
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Create a named function message.
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            name: Some(name.into()),
            content: content.into(),
        }
    }
}

/// One historical exchange: what the user said and what the assistant replied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The user's message.
    pub user: String,
    /// The assistant's reply.
    pub assistant: String,
}

impl ConversationTurn {
    /// Create a turn from a user/assistant pair.
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Build the ordered message list for a request.
///
/// The result always starts with exactly one system message (even when
/// `system_prompt` is empty), followed by a user and an assistant message per
/// history turn in input order. The current prompt is appended last when it
/// is `Some` and non-empty; an empty prompt means "no additional turn".
pub fn build_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    prompt: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2 + history.len() * 2);
    messages.push(ChatMessage::system(system_prompt));

    for turn in history {
        messages.push(ChatMessage::user(turn.user.as_str()));
        messages.push(ChatMessage::assistant(turn.assistant.as_str()));
    }

    if let Some(prompt) = prompt
        && !prompt.is_empty()
    {
        messages.push(ChatMessage::user(prompt));
    }

    messages
}

/// Convert a 2-D spreadsheet range into conversation history.
///
/// Column 0 is the user text and column 1 the assistant reply; further
/// columns are ignored. Rows whose cells are all blank are skipped.
///
/// # Errors
/// Returns [`CellGptError::ConfigError`] for a non-blank row with fewer than
/// two cells.
pub fn history_from_rows(rows: &[Vec<String>]) -> Result<Vec<ConversationTurn>> {
    let mut turns = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        match row.as_slice() {
            [user, assistant, ..] => turns.push(ConversationTurn::new(user.as_str(), assistant.as_str())),
            _ => {
                return Err(CellGptError::ConfigError(format!(
                    "conversation history row {} needs a user and an assistant cell",
                    idx + 1
                )));
            }
        }
    }
    Ok(turns)
}
