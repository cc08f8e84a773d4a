//! Config file operations.
//!
//! Reads are strict (a file that exists must parse and validate); writes are
//! atomic (temp file → fsync → rename).

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CellGptError, Result};

use super::types::CellGptConfig;

/// Default config location: `<config_dir>/cellgpt/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cellgpt").join("config.toml"))
}

/// Read, parse, and validate a config file.
///
/// # Errors
/// Returns [`CellGptError::ConfigError`] if the file cannot be read, parsed,
/// or fails validation.
pub fn read_config(path: &Path) -> Result<CellGptConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CellGptError::ConfigError(format!(
            "failed to read config file '{}': {e}",
            path.display()
        ))
    })?;
    let config: CellGptConfig = toml::from_str(&contents).map_err(|e| {
        CellGptError::ConfigError(format!(
            "failed to parse config file '{}': {e}",
            path.display()
        ))
    })?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`, or at the default location.
///
/// An explicit path must exist. When no path is given and the default file
/// is absent, built-in defaults are returned.
pub fn load_or_default(path: Option<&Path>) -> Result<CellGptConfig> {
    match path {
        Some(p) => read_config(p),
        None => match default_config_path() {
            Some(p) if p.exists() => read_config(&p),
            _ => {
                tracing::debug!("no config file found, using defaults");
                Ok(CellGptConfig::default())
            }
        },
    }
}

impl CellGptConfig {
    /// Read, parse, and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        read_config(path)
    }

    /// Persist to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_config_atomic(path, self)
    }
}

/// Write a config file atomically (temp file → fsync → rename).
///
/// # Errors
/// Returns [`CellGptError::ConfigError`] on serialization, write, or rename failure.
pub fn write_config_atomic(path: &Path, config: &CellGptConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| CellGptError::ConfigError(format!("failed to serialize config: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CellGptError::ConfigError(format!(
                "failed to create config directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        CellGptError::ConfigError(format!(
            "failed to create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(toml_str.as_bytes())
        .map_err(|e| CellGptError::ConfigError(format!("failed to write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| CellGptError::ConfigError(format!("failed to sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        CellGptError::ConfigError(format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::ModelName;

    fn make_test_dir() -> tempfile::TempDir {
        match tempfile::tempdir() {
            Ok(d) => d,
            Err(_) => unreachable!("tempdir creation should not fail"),
        }
    }

    #[test]
    fn write_and_read_config() {
        let dir = make_test_dir();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CellGptConfig::default();
        config.defaults.model = ModelName::Gpt35Turbo;
        config.defaults.max_tokens = 4000;

        assert!(write_config_atomic(&path, &config).is_ok());
        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        match read_config(&path) {
            Ok(loaded) => assert_eq!(loaded, config),
            Err(e) => unreachable!("config should load: {e}"),
        }
    }

    #[test]
    fn read_config_not_found() {
        let dir = make_test_dir();
        let result = read_config(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(CellGptError::ConfigError(_))));
    }

    #[test]
    fn read_config_invalid_toml() {
        let dir = make_test_dir();
        let path = dir.path().join("config.toml");
        assert!(std::fs::write(&path, "this is [not valid").is_ok());
        assert!(matches!(read_config(&path), Err(CellGptError::ConfigError(_))));
    }

    #[test]
    fn read_config_runs_validation() {
        let dir = make_test_dir();
        let path = dir.path().join("config.toml");
        assert!(std::fs::write(&path, "[defaults]\ntemperature = 9.0\n").is_ok());
        match read_config(&path) {
            Err(CellGptError::ConfigError(msg)) => assert!(msg.contains("temperature")),
            other => unreachable!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn load_explicit_path_must_exist() {
        let dir = make_test_dir();
        let missing = dir.path().join("nope.toml");
        assert!(load_or_default(Some(&missing)).is_err());
    }
}
