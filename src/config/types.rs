//! Configuration schema types.
//!
//! ```toml
//! [api]
//! base_url = "https://api.openai.com"
//! connect_timeout_secs = 10
//! request_timeout_secs = 120
//!
//! [defaults]
//! model = "gpt-4-0613"
//! max_tokens = 1000
//! temperature = 0.0
//! system_prompt = "You are a helpful assistant."
//!
//! [prompts]
//! assistant = "You are a helpful assistant."
//! marketer = "You are a professional marketer."
//! analyzer = "Given the following data, what marketing measures would you take?\n{data}"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CellGptError, Result};
use crate::openai::client::{ClientConfig, DEFAULT_BASE_URL};
use crate::openai::{GenerationOptions, ModelName};

/// Placeholder the analyzer template substitutes the range into.
pub const DATA_PLACEHOLDER: &str = "{data}";

/// Root configuration struct, deserialized from the TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellGptConfig {
    /// Endpoint and transport settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Defaults applied when a spreadsheet argument is omitted.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// System prompts of the specialised functions.
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// Endpoint and transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API origin (tests point this at a mock server).
    pub base_url: String,
    /// Connection deadline in seconds. `0` disables it.
    pub connect_timeout_secs: u64,
    /// Non-streaming request deadline in seconds. `0` disables it.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    /// Transport settings for [`ChatClient`](crate::openai::ChatClient).
    pub fn client_config(&self) -> ClientConfig {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        ClientConfig {
            base_url: self.base_url.clone(),
            connect_timeout: secs(self.connect_timeout_secs),
            request_timeout: secs(self.request_timeout_secs),
        }
    }
}

/// Values used when a function argument is omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Model identifier.
    pub model: ModelName,
    /// Generation length cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// System prompt for `chat` and `GPT` without one.
    pub system_prompt: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: ModelName::default(),
            max_tokens: 1000,
            temperature: 0.0,
            system_prompt: "You are a helpful assistant.".into(),
        }
    }
}

impl DefaultsConfig {
    /// Fill omitted generation arguments from the defaults.
    pub fn options(&self, max_tokens: Option<u32>, temperature: Option<f64>) -> GenerationOptions {
        GenerationOptions {
            max_tokens: Some(max_tokens.unwrap_or(self.max_tokens)),
            temperature: Some(temperature.unwrap_or(self.temperature)),
        }
    }
}

/// System prompts of the specialised functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// `assistantGPT` system prompt.
    pub assistant: String,
    /// `marketerGPT` and `analyzer` system prompt.
    pub marketer: String,
    /// `analyzer` user prompt; `{data}` is replaced with the range.
    pub analyzer: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            assistant: "You are a helpful assistant.".into(),
            marketer: "You are a professional marketer.".into(),
            analyzer: "Given the following data, what marketing measures would you take?\n\
                       # data:\n{data}"
                .into(),
        }
    }
}

impl CellGptConfig {
    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    /// Returns [`CellGptError::ConfigError`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(CellGptError::ConfigError("api.base_url must not be empty".into()));
        }
        self.defaults
            .options(None, None)
            .validate()
            .map_err(|e| CellGptError::ConfigError(format!("[defaults] {}", e.message())))?;
        if !self.prompts.analyzer.contains(DATA_PLACEHOLDER) {
            return Err(CellGptError::ConfigError(format!(
                "prompts.analyzer must contain the {DATA_PLACEHOLDER} placeholder"
            )));
        }
        Ok(())
    }
}
