//! Request codec for the Chat Completions API.
//!
//! Serializes model, messages, and generation parameters into the JSON body
//! of `POST /v1/chat/completions`, and builds the authentication headers.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{CellGptError, Result};
use crate::openai::message::ChatMessage;
use crate::openai::model::ModelName;

/// Upper bound of the sampling temperature accepted by the API.
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Generation parameters shared by every call variant.
///
/// # Examples
///
/// ```
/// use cellgpt::openai::request::GenerationOptions;
///
/// let opts = GenerationOptions::new().with_max_tokens(1000).with_temperature(0.0);
/// assert!(opts.validate().is_ok());
/// assert!(GenerationOptions::new().with_temperature(2.5).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate. `None` leaves it to the provider.
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0 = deterministic, 2.0 = max randomness).
    pub temperature: Option<f64>,
}

impl GenerationOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generation length cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Check the ranges the API accepts.
    ///
    /// # Errors
    /// Returns [`CellGptError::ConfigError`] when `max_tokens` is zero or
    /// `temperature` is outside `[0, 2]`.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == Some(0) {
            return Err(CellGptError::ConfigError(
                "max_tokens must be greater than zero".into(),
            ));
        }
        if let Some(t) = self.temperature
            && !(0.0..=MAX_TEMPERATURE).contains(&t)
        {
            return Err(CellGptError::ConfigError(format!(
                "temperature must be between 0 and {MAX_TEMPERATURE}, got {t}"
            )));
        }
        Ok(())
    }
}

/// The JSON body of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Target model.
    pub model: ModelName,
    /// System, history, then the current prompt.
    pub messages: Vec<ChatMessage>,
    /// Generation length cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Whether the response is streamed as data events.
    pub stream: bool,
}

impl CompletionRequest {
    /// Assemble a request body.
    ///
    /// # Errors
    /// Returns [`CellGptError::ConfigError`] when `options` are out of range.
    pub fn new(
        model: ModelName,
        messages: Vec<ChatMessage>,
        options: GenerationOptions,
        stream: bool,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream,
        })
    }

    /// Serialize to the wire body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CellGptError::ParseError(format!("failed to encode request body: {e}")))
    }

    /// Parse a wire body back into a request.
    pub fn decode(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| CellGptError::ParseError(format!("invalid request body: {e}")))
    }
}

/// Build `Content-Type` and bearer `Authorization` headers.
///
/// # Errors
/// Returns [`CellGptError::AuthError`] when the key is empty or blank, and
/// when it cannot be carried in a header.
pub fn build_headers(api_key: &str) -> Result<HeaderMap> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(CellGptError::AuthError("OpenAI API key is not set".into()));
    }

    let mut auth = HeaderValue::from_str(&format!("Bearer {key}"))
        .map_err(|_| CellGptError::AuthError("OpenAI API key contains invalid characters".into()))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(AUTHORIZATION, auth);
    Ok(headers)
}
