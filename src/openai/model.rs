//! Supported chat-completion model identifiers.
//!
//! Spreadsheet callers pass the model as free text. [`ModelName`] is the
//! closed set we forward to the API; anything else is rejected with a
//! [`CellGptError::ConfigError`] before a request is built.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CellGptError;

/// A chat-completion model this crate knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelName {
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-3.5-turbo-0301")]
    Gpt35Turbo0301,
    #[serde(rename = "gpt-3.5-turbo-0613")]
    Gpt35Turbo0613,
    #[serde(rename = "gpt-3.5-turbo-16k")]
    Gpt35Turbo16k,
    #[serde(rename = "gpt-3.5-turbo-16k-0613")]
    Gpt35Turbo16k0613,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-0314")]
    Gpt40314,
    /// Default snapshot used by every spreadsheet function.
    #[default]
    #[serde(rename = "gpt-4-0613")]
    Gpt40613,
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
}

impl ModelName {
    /// Every supported model, in catalogue order.
    pub const ALL: [ModelName; 11] = [
        Self::Gpt35Turbo,
        Self::Gpt35Turbo0301,
        Self::Gpt35Turbo0613,
        Self::Gpt35Turbo16k,
        Self::Gpt35Turbo16k0613,
        Self::Gpt4,
        Self::Gpt40314,
        Self::Gpt40613,
        Self::Gpt4Turbo,
        Self::Gpt4o,
        Self::Gpt4oMini,
    ];

    /// The wire identifier sent in the `model` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Gpt35Turbo0301 => "gpt-3.5-turbo-0301",
            Self::Gpt35Turbo0613 => "gpt-3.5-turbo-0613",
            Self::Gpt35Turbo16k => "gpt-3.5-turbo-16k",
            Self::Gpt35Turbo16k0613 => "gpt-3.5-turbo-16k-0613",
            Self::Gpt4 => "gpt-4",
            Self::Gpt40314 => "gpt-4-0314",
            Self::Gpt40613 => "gpt-4-0613",
            Self::Gpt4Turbo => "gpt-4-turbo",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelName {
    type Err = CellGptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| CellGptError::ConfigError(format!("unknown model identifier '{wanted}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_gpt4_snapshot() {
        assert_eq!(ModelName::default(), ModelName::Gpt40613);
        assert_eq!(ModelName::default().as_str(), "gpt-4-0613");
    }

    #[test]
    fn parse_known_identifiers() {
        for model in ModelName::ALL {
            let parsed: Result<ModelName, _> = model.as_str().parse();
            match parsed {
                Ok(m) => assert_eq!(m, model),
                Err(e) => unreachable!("{model} failed to parse: {e}"),
            }
        }
    }

    #[test]
    fn parse_trims_whitespace() {
        let parsed = " gpt-4o ".parse::<ModelName>();
        assert!(matches!(parsed, Ok(ModelName::Gpt4o)));
    }

    #[test]
    fn unknown_identifier_is_config_error() {
        let parsed = "gpt-5-ultra".parse::<ModelName>();
        match parsed {
            Err(CellGptError::ConfigError(msg)) => assert!(msg.contains("gpt-5-ultra")),
            other => unreachable!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn serde_uses_wire_identifier() {
        let json = serde_json::to_string(&ModelName::Gpt35Turbo16k).unwrap_or_default();
        assert_eq!(json, "\"gpt-3.5-turbo-16k\"");

        let parsed: Result<ModelName, _> = serde_json::from_str("\"gpt-4-0314\"");
        assert!(matches!(parsed, Ok(ModelName::Gpt40314)));
    }

    #[test]
    fn serde_rejects_unknown_identifier() {
        let parsed: Result<ModelName, _> = serde_json::from_str("\"davinci\"");
        assert!(parsed.is_err());
    }
}
