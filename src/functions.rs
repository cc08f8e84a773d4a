//! Spreadsheet-callable functions.
//!
//! Each function resolves the API key, fills omitted arguments from the
//! configured defaults, and forwards to the shared [`ChatClient`]. Ranges
//! arrive as rows of cell strings.
//!
//! | Function | Method |
//! |---|---|
//! | `GPT` | [`Functions::gpt`] |
//! | `chat` | [`Functions::chat`] |
//! | `streamGPT` | [`Functions::stream_gpt`] |
//! | `streamChat` | [`Functions::stream_chat`] |
//! | `marketerGPT` | [`Functions::marketer_gpt`] |
//! | `marketerStreamGPT` | [`Functions::marketer_stream_gpt`] |
//! | `assistantGPT` | [`Functions::assistant_gpt`] |
//! | `analyzer` | [`Functions::analyzer`] |
//! | `LOG` | [`log_message`] |
//! | `logRange` | [`log_range`] |

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::CellGptConfig;
use crate::config::types::DATA_PLACEHOLDER;
use crate::credentials::{KeyStore, resolve_api_key};
use crate::error::Result;
use crate::openai::message::history_from_rows;
use crate::openai::{ChatClient, ChatRequest, Invocation, ModelName, StreamOutcome};

/// Optional arguments shared by the GPT-style functions.
///
/// `None` fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GptArgs {
    /// System prompt. Ignored by functions with a fixed persona.
    pub system_prompt: Option<String>,
    /// Current user prompt.
    pub prompt: Option<String>,
    /// Conversation range: user text in column 0, assistant text in column 1.
    pub history: Vec<Vec<String>>,
    /// Model identifier as typed into the cell.
    pub model: Option<String>,
    /// Generation length cap.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl GptArgs {
    /// Arguments with only a user prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Set the conversation range.
    pub fn with_history(mut self, rows: Vec<Vec<String>>) -> Self {
        self.history = rows;
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
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
}

/// The function surface, bound to one client, key store and config.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Functions {
    client: ChatClient,
    keys: Arc<dyn KeyStore>,
    config: Arc<CellGptConfig>,
}

impl std::fmt::Debug for Functions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Functions")
            .field("client", &self.client)
            .field("keys", &self.keys.name())
            .finish()
    }
}

impl Functions {
    /// Build the function surface from a validated config.
    ///
    /// # Errors
    /// Returns [`CellGptError::ConfigError`](crate::CellGptError::ConfigError)
    /// if the config is invalid.
    pub fn new(config: CellGptConfig, keys: Arc<dyn KeyStore>) -> Result<Self> {
        config.validate()?;
        let client = ChatClient::new(config.api.client_config())?;
        Ok(Self {
            client,
            keys,
            config: Arc::new(config),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &CellGptConfig {
        &self.config
    }

    /// The underlying client.
    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// `GPT(systemPrompt, userPrompt?, history?, model?, maxTokens?, temperature?)`.
    pub async fn gpt(&self, args: &GptArgs) -> Result<String> {
        let request = self.build_request(None, args)?;
        self.complete(&request).await
    }

    /// `chat(prompt)`: default system prompt and model, no history.
    pub async fn chat(&self, prompt: &str) -> Result<String> {
        self.gpt(&GptArgs::new(prompt)).await
    }

    /// `streamGPT`: like [`gpt`](Self::gpt) but publishes into `invocation`.
    pub async fn stream_gpt<I>(&self, args: &GptArgs, invocation: &mut I) -> Result<StreamOutcome>
    where
        I: Invocation + ?Sized,
    {
        let request = self.build_request(None, args);
        self.stream(request, invocation).await
    }

    /// `streamChat(prompt)`.
    pub async fn stream_chat<I>(&self, prompt: &str, invocation: &mut I) -> Result<StreamOutcome>
    where
        I: Invocation + ?Sized,
    {
        self.stream_gpt(&GptArgs::new(prompt), invocation).await
    }

    /// `marketerGPT`: fixed marketer persona.
    pub async fn marketer_gpt(&self, args: &GptArgs) -> Result<String> {
        let request = self.build_request(Some(&self.config.prompts.marketer), args)?;
        self.complete(&request).await
    }

    /// `marketerStreamGPT`.
    pub async fn marketer_stream_gpt<I>(
        &self,
        args: &GptArgs,
        invocation: &mut I,
    ) -> Result<StreamOutcome>
    where
        I: Invocation + ?Sized,
    {
        let request = self.build_request(Some(&self.config.prompts.marketer), args);
        self.stream(request, invocation).await
    }

    /// `assistantGPT`: fixed assistant persona.
    pub async fn assistant_gpt(&self, args: &GptArgs) -> Result<String> {
        let request = self.build_request(Some(&self.config.prompts.assistant), args)?;
        self.complete(&request).await
    }

    /// `analyzer(range, history?, model?, maxTokens?, temperature?)`.
    ///
    /// The range becomes the user prompt; `args.prompt` is ignored.
    pub async fn analyzer(&self, range: &[Vec<String>], args: &GptArgs) -> Result<String> {
        let args = GptArgs {
            prompt: Some(analyzer_prompt(&self.config.prompts.analyzer, range)),
            ..args.clone()
        };
        let request = self.build_request(Some(&self.config.prompts.marketer), &args)?;
        self.complete(&request).await
    }

    /// Fire-and-forget `streamGPT`: the host keeps only the invocation's
    /// cancellation handle.
    pub fn spawn_stream_gpt<I>(&self, args: GptArgs, mut invocation: I) -> JoinHandle<Result<StreamOutcome>>
    where
        I: Invocation + 'static,
    {
        let functions = self.clone();
        tokio::spawn(async move { functions.stream_gpt(&args, &mut invocation).await })
    }

    fn build_request(&self, persona: Option<&str>, args: &GptArgs) -> Result<ChatRequest> {
        let defaults = &self.config.defaults;
        let model = match args.model.as_deref() {
            Some(m) if !m.trim().is_empty() => m.parse::<ModelName>()?,
            _ => defaults.model,
        };
        let system_prompt = persona
            .map(str::to_string)
            .or_else(|| args.system_prompt.clone())
            .unwrap_or_else(|| defaults.system_prompt.clone());

        let mut request = ChatRequest::new(system_prompt)
            .with_model(model)
            .with_history(history_from_rows(&args.history)?)
            .with_options(defaults.options(args.max_tokens, args.temperature));
        request.prompt = args.prompt.clone();
        Ok(request)
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let key = resolve_api_key(self.keys.as_ref()).await?;
        self.client.complete(&key, request).await
    }

    async fn stream<I>(&self, request: Result<ChatRequest>, invocation: &mut I) -> Result<StreamOutcome>
    where
        I: Invocation + ?Sized,
    {
        let prepared = match request {
            Ok(r) => resolve_api_key(self.keys.as_ref()).await.map(|key| (key, r)),
            Err(e) => Err(e),
        };
        match prepared {
            Ok((key, request)) => self.client.stream_complete(&key, &request, invocation).await,
            Err(e) => {
                invocation.fail(&e);
                Err(e)
            }
        }
    }
}

/// Render the range as CSV-like text (cells joined by `,`, rows by `\n`).
pub fn range_to_text(range: &[Vec<String>]) -> String {
    range
        .iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute the rendered range into the analyzer template.
pub fn analyzer_prompt(template: &str, range: &[Vec<String>]) -> String {
    template.replace(DATA_PLACEHOLDER, &range_to_text(range))
}

/// `LOG(message)`: log and echo back.
pub fn log_message(message: &str) -> &str {
    tracing::info!(target: "cellgpt::log", "{message}");
    message
}

/// `logRange(range)`: log every row.
pub fn log_range(range: &[Vec<String>]) {
    tracing::info!(target: "cellgpt::log", rows = range.len(), "range");
    for (i, row) in range.iter().enumerate() {
        tracing::info!(target: "cellgpt::log", row = i, "{}", row.join(","));
    }
}
