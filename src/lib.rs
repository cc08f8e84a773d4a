//! cellgpt: chat-completion engine behind spreadsheet GPT functions.
//!
//! Prompts typed into cells are forwarded to an OpenAI-compatible
//! chat-completion endpoint. Results come back either as one value or as a
//! stream that republishes the growing text into the cell.
//!
//! # Architecture
//!
//! - **[`openai`]**: message builder, request codec, response schema,
//!   `data:` line decoder, token stream, and the HTTP client
//! - **[`functions`]**: the spreadsheet-callable surface (`GPT`, `chat`,
//!   `streamGPT`, `analyzer`, ...)
//! - **[`credentials`]**: where the API key comes from
//! - **[`config`]**: TOML configuration with defaults

pub mod config;
pub mod credentials;
pub mod error;
pub mod functions;
pub mod openai;

pub use config::CellGptConfig;
pub use error::{CellErrorCode, CellGptError, Result};
pub use functions::{Functions, GptArgs};
pub use openai::{ChatClient, ChatRequest, Invocation, ModelName, StreamOutcome};
