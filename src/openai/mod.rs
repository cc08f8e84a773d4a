//! Chat-completion API layer.
//!
//! - [`message`]: role-tagged messages and the message builder
//! - [`model`]: the closed set of model identifiers
//! - [`request`]: request body codec and auth headers
//! - [`response`]: typed response and stream-chunk schemas
//! - [`sse`]: byte-level decoder for `data:` event lines
//! - [`stream`]: token stream and accumulation into an invocation
//! - [`invocation`]: the host sink and cancellation handle
//! - [`client`]: the HTTP client tying it together

pub mod client;
pub mod invocation;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod sse;
pub mod stream;

pub use client::{ChatClient, ClientConfig};
pub use invocation::{CallbackInvocation, Invocation, StreamOutcome};
pub use message::{ChatMessage, ConversationTurn, Role};
pub use model::ModelName;
pub use request::GenerationOptions;

use crate::error::Result;
use request::CompletionRequest;

/// Everything a caller supplies for one completion, before encoding.
///
/// # Examples
///
/// ```
/// use cellgpt::openai::{ChatRequest, ConversationTurn, ModelName};
///
/// let request = ChatRequest::new("You are a helpful assistant.")
///     .with_history(vec![ConversationTurn::new("Hi", "Hello!")])
///     .with_prompt("What is 2+2?")
///     .with_model(ModelName::Gpt4o);
/// assert_eq!(request.messages().len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Target model.
    pub model: ModelName,
    /// System instructions; always sent, even when empty.
    pub system_prompt: String,
    /// Previous exchanges, oldest first.
    pub history: Vec<ConversationTurn>,
    /// The current user prompt. `None` or empty sends history only.
    pub prompt: Option<String>,
    /// Generation parameters.
    pub options: GenerationOptions,
}

impl ChatRequest {
    /// A request with the given system prompt and default model.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            model: ModelName::default(),
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            prompt: None,
            options: GenerationOptions::default(),
        }
    }

    /// Set the current user prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the conversation history.
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: ModelName) -> Self {
        self.model = model;
        self
    }

    /// Set generation options.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// The ordered messages this request sends.
    pub fn messages(&self) -> Vec<ChatMessage> {
        message::build_messages(&self.system_prompt, &self.history, self.prompt.as_deref())
    }

    /// Encode-ready body.
    ///
    /// # Errors
    /// Returns [`CellGptError::ConfigError`](crate::CellGptError::ConfigError)
    /// for out-of-range options.
    pub fn to_completion_request(&self, stream: bool) -> Result<CompletionRequest> {
        CompletionRequest::new(self.model, self.messages(), self.options, stream)
    }
}
