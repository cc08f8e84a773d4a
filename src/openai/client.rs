//! Chat Completions HTTP client.
//!
//! One client serves every call variant: [`ChatClient::complete`] for a
//! single JSON response and [`ChatClient::stream_complete`] /
//! [`ChatClient::stream_tokens`] for `stream: true` responses.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cellgpt::openai::client::{ChatClient, ClientConfig};
//! use cellgpt::openai::ChatRequest;
//!
//! # async fn example() -> Result<(), cellgpt::CellGptError> {
//! let client = ChatClient::new(ClientConfig::default())?;
//! let request = ChatRequest::new("You are a helpful assistant.").with_prompt("What is 2+2?");
//! let text = client.complete("sk-...", &request).await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{CellGptError, Result};
use crate::openai::ChatRequest;
use crate::openai::invocation::{Invocation, StreamOutcome};
use crate::openai::request::{CompletionRequest, build_headers};
use crate::openai::response::CompletionResponse;
use crate::openai::stream::{ByteStream, TokenStream, drive_invocation, token_stream};

/// Default API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Path of the chat-completion endpoint.
pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Transport settings for [`ChatClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API origin, without the endpoint path.
    pub base_url: String,
    /// Connection establishment deadline, applied to every call.
    pub connect_timeout: Option<Duration>,
    /// Whole-request deadline for non-streaming calls only.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            connect_timeout: Some(Duration::from_secs(10)),
            request_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl ClientConfig {
    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set or clear the non-streaming request deadline.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Client for `POST /v1/chat/completions`.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ChatClient {
    config: ClientConfig,
    http: reqwest::Client,
    endpoint: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.config.request_timeout)
            .finish()
    }
}

impl ChatClient {
    /// Build a client.
    ///
    /// # Errors
    /// Returns [`CellGptError::ConfigError`] for an empty base URL or when the
    /// HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(CellGptError::ConfigError("base_url must not be empty".into()));
        }
        let endpoint = format!("{base}{COMPLETIONS_PATH}");

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| CellGptError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            endpoint,
        })
    }

    /// Full endpoint URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a non-streaming completion and return the first choice's text.
    ///
    /// # Errors
    /// - [`CellGptError::AuthError`] for an empty key, before any request.
    /// - [`CellGptError::ConfigError`] for out-of-range options.
    /// - [`CellGptError::RequestError`] for a non-2xx status.
    /// - [`CellGptError::ParseError`] for a malformed body or missing text.
    /// - [`CellGptError::TransportError`] / [`CellGptError::TimeoutError`] from the network.
    pub async fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<String> {
        let response = self.complete_response(api_key, request).await?;
        response.first_text().map(str::to_string)
    }

    /// Run a non-streaming completion and return the whole typed response.
    pub async fn complete_response(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<CompletionResponse> {
        let body = request.to_completion_request(false)?;
        let mut http_request = self.prepare(api_key, &body)?;
        if let Some(timeout) = self.config.request_timeout {
            http_request = http_request.timeout(timeout);
        }

        let response = self.send(http_request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CellGptError::from_transport("failed to read response body", e))?;
        let parsed = CompletionResponse::from_slice(&bytes)?;

        tracing::debug!(
            id = %parsed.id,
            model = %parsed.model,
            total_tokens = parsed.usage.map(|u| u.total_tokens),
            "completion received"
        );
        Ok(parsed)
    }

    /// Start a streaming completion and return its delta tokens.
    ///
    /// The returned stream is lazy, finite and not restartable. It stops
    /// early when `cancel` fires. A token cancelled before the call sends
    /// nothing; one cancelled while waiting for response headers aborts the
    /// request. Both cases yield an empty stream.
    pub async fn stream_tokens(
        &self,
        api_key: &str,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TokenStream> {
        let body = request.to_completion_request(true)?;
        let http_request = self.prepare(api_key, &body)?;
        if cancel.is_cancelled() {
            tracing::debug!("stream cancelled before request");
            return Ok(empty_stream());
        }

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            response = self.send(http_request) => Some(response),
        };
        let Some(response) = sent else {
            tracing::debug!("stream cancelled while awaiting headers");
            return Ok(empty_stream());
        };
        let response = response?;

        if let Some(provider_id) = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
        {
            tracing::debug!(provider_request_id = provider_id, "stream opened");
        }

        let bytes: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| CellGptError::from_transport("stream read failed", e))),
        );
        Ok(token_stream(bytes, cancel))
    }

    /// Stream a completion into `invocation`, publishing the accumulated
    /// text after every token.
    ///
    /// Errors are returned and also passed to [`Invocation::fail`].
    pub async fn stream_complete<I>(
        &self,
        api_key: &str,
        request: &ChatRequest,
        invocation: &mut I,
    ) -> Result<StreamOutcome>
    where
        I: Invocation + ?Sized,
    {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::debug_span!("stream_complete", %request_id, model = %request.model);

        async {
            let cancel = invocation.cancellation();
            let tokens = match self.stream_tokens(api_key, request, cancel).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    invocation.fail(&e);
                    return Err(e);
                }
            };
            drive_invocation(tokens, invocation).await
        }
        .instrument(span)
        .await
    }

    /// Validate the key and build the POST with headers and body.
    fn prepare(&self, api_key: &str, body: &CompletionRequest) -> Result<reqwest::RequestBuilder> {
        let headers = build_headers(api_key)?;
        let payload = body.encode()?;
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %body.model,
            messages = body.messages.len(),
            stream = body.stream,
            "sending chat completion request"
        );
        Ok(self.http.post(&self.endpoint).headers(headers).body(payload))
    }

    /// Send and reject non-success statuses without parsing the body as a completion.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| CellGptError::from_transport("chat completion request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read error body");
                    String::new()
                }
            };
            let err = map_http_error(status, &body);
            tracing::warn!(status = status.as_u16(), error = %err, "chat completion rejected");
            return Err(err);
        }
        Ok(response)
    }
}

fn empty_stream() -> TokenStream {
    Box::pin(futures_util::stream::empty())
}

/// Map a non-success status to a [`CellGptError::RequestError`].
fn map_http_error(status: reqwest::StatusCode, body: &str) -> CellGptError {
    CellGptError::RequestError {
        status: status.as_u16(),
        message: extract_error_message(body, status),
    }
}

/// Pull `error.message` out of an error body, falling back to the raw body
/// or the status reason.
fn extract_error_message(body: &str, status: reqwest::StatusCode) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        });
    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}
