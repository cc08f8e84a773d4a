//! TOML configuration for cellgpt.
//!
//! - [`types`]: the config schema with built-in defaults
//! - [`persist`]: load, validate, and atomic write

pub mod persist;
pub mod types;

pub use persist::{default_config_path, load_or_default, read_config, write_config_atomic};
pub use types::{ApiConfig, CellGptConfig, DefaultsConfig, PromptsConfig};
