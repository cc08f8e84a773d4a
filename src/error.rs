//! Error types for cellgpt.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via [`CellGptError::code()`].
//! Codes are part of the public API contract and will not change.

use std::fmt;

/// Stable error codes for programmatic error handling.
///
/// Use these for distinguishing errors rather than parsing Display output.
pub mod error_codes {
    /// Invalid or missing configuration (unknown model, out-of-range option, bad range).
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Missing or empty API key.
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// The provider answered with a non-success HTTP status.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// A response body or stream event was not the expected JSON shape.
    pub const PARSE_FAILED: &str = "PARSE_FAILED";

    /// The underlying network transport failed.
    pub const TRANSPORT_FAILED: &str = "TRANSPORT_FAILED";

    /// Request timed out.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// The credential store backend failed.
    pub const CREDENTIAL_ERROR: &str = "CREDENTIAL_ERROR";
}

/// Errors produced by cellgpt.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum CellGptError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    ConfigError(String),

    /// Missing or empty API key. Raised before any network call.
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    AuthError(String),

    /// Non-success HTTP status from the provider.
    #[error("[{}] HTTP {status}: {message}", error_codes::REQUEST_FAILED)]
    RequestError {
        /// The HTTP status code.
        status: u16,
        /// Provider error message, or the raw body when it has none.
        message: String,
    },

    /// Malformed JSON in a response body or stream event.
    #[error("[{}] {}", error_codes::PARSE_FAILED, .0)]
    ParseError(String),

    /// Network failure (connection reset, DNS, broken body stream).
    #[error("[{}] {}", error_codes::TRANSPORT_FAILED, .0)]
    TransportError(String),

    /// Request timed out.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    TimeoutError(String),

    /// Credential storage failure.
    #[error("[{}] {}", error_codes::CREDENTIAL_ERROR, .0)]
    CredentialError(String),
}

impl CellGptError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => error_codes::CONFIG_INVALID,
            Self::AuthError(_) => error_codes::AUTH_FAILED,
            Self::RequestError { .. } => error_codes::REQUEST_FAILED,
            Self::ParseError(_) => error_codes::PARSE_FAILED,
            Self::TransportError(_) => error_codes::TRANSPORT_FAILED,
            Self::TimeoutError(_) => error_codes::TIMEOUT_ERROR,
            Self::CredentialError(_) => error_codes::CREDENTIAL_ERROR,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ConfigError(m)
            | Self::AuthError(m)
            | Self::ParseError(m)
            | Self::TransportError(m)
            | Self::TimeoutError(m)
            | Self::CredentialError(m) => m,
            Self::RequestError { message, .. } => message,
        }
    }

    /// HTTP status carried by a [`RequestError`](Self::RequestError).
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The error value a spreadsheet cell shows for this failure.
    pub fn cell_error(&self) -> CellErrorCode {
        match self {
            Self::ConfigError(_) => CellErrorCode::InvalidValue,
            _ => CellErrorCode::NotAvailable,
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub(crate) fn from_transport(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(format!("{context}: {err}"))
        } else {
            Self::TransportError(format!("{context}: {err}"))
        }
    }
}

/// Spreadsheet error values surfaced by failed functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellErrorCode {
    /// `#VALUE!`: an argument was rejected.
    InvalidValue,
    /// `#N/A`: the result could not be produced.
    NotAvailable,
}

impl fmt::Display for CellErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue => write!(f, "#VALUE!"),
            Self::NotAvailable => write!(f, "#N/A"),
        }
    }
}

/// Convenience alias for cellgpt results.
pub type Result<T> = std::result::Result<T, CellGptError>;
