//! API key storage.
//!
//! The only thing the client needs from a credential store is the key
//! string. [`KeyStore`] abstracts over where it comes from:
//!
//! - [`KeyringStore`]: the OS credential store (via `keyring`)
//! - [`EnvKeyStore`]: the `OPENAI_API_KEY` environment variable
//! - [`MemoryKeyStore`]: in-process, for tests and embedding hosts
//! - [`ChainKeyStore`]: first store that has a key wins
//!
//! ## Usage
//!
//! ```no_run
//! use cellgpt::credentials::{default_store, resolve_api_key};
//!
//! # async fn example() -> Result<(), cellgpt::CellGptError> {
//! let store = default_store();
//! let key = resolve_api_key(store.as_ref()).await?;
//! # let _ = key;
//! # Ok(())
//! # }
//! ```

mod encrypted;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

pub use encrypted::{API_KEY_ACCOUNT, KeyringStore, SERVICE_NAME};

use crate::error::{CellGptError, Result};

/// Environment variable read by [`EnvKeyStore`].
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// A source of the API key.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// The stored key, or `None` when nothing is stored.
    ///
    /// # Errors
    /// Returns [`CellGptError::CredentialError`] if the backend fails.
    async fn get(&self) -> Result<Option<String>>;

    /// Replace the stored key.
    ///
    /// # Errors
    /// Returns [`CellGptError::CredentialError`] if the backend fails or is read-only.
    async fn set(&self, key: &str) -> Result<()>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Read-only store over an environment variable.
#[derive(Debug, Clone)]
pub struct EnvKeyStore {
    var: String,
}

impl EnvKeyStore {
    /// Read [`API_KEY_ENV`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_var(API_KEY_ENV)
    }

    /// Read a custom variable.
    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for EnvKeyStore {
    async fn get(&self) -> Result<Option<String>> {
        Ok(std::env::var(&self.var).ok().filter(|v| !v.trim().is_empty()))
    }

    async fn set(&self, _key: &str) -> Result<()> {
        Err(CellGptError::CredentialError(format!(
            "environment variable {} is read-only",
            self.var
        )))
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: RwLock<Option<String>>,
}

impl MemoryKeyStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `key`.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: RwLock::new(Some(key.into())),
        }
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self) -> Result<Option<String>> {
        self.key
            .read()
            .map(|k| k.clone())
            .map_err(|_| CellGptError::CredentialError("memory store lock poisoned".into()))
    }

    async fn set(&self, key: &str) -> Result<()> {
        let mut guard = self
            .key
            .write()
            .map_err(|_| CellGptError::CredentialError("memory store lock poisoned".into()))?;
        *guard = Some(key.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Tries stores in order; writes go to the first one.
pub struct ChainKeyStore {
    stores: Vec<Arc<dyn KeyStore>>,
}

impl ChainKeyStore {
    /// Chain `stores`, highest priority first.
    pub fn new(stores: Vec<Arc<dyn KeyStore>>) -> Self {
        Self { stores }
    }
}

impl std::fmt::Debug for ChainKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.stores.iter().map(|s| s.name()).collect();
        f.debug_struct("ChainKeyStore").field("stores", &names).finish()
    }
}

#[async_trait]
impl KeyStore for ChainKeyStore {
    async fn get(&self) -> Result<Option<String>> {
        for store in &self.stores {
            if let Some(key) = store.get().await? {
                tracing::debug!(store = store.name(), "API key resolved");
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &str) -> Result<()> {
        match self.stores.first() {
            Some(store) => store.set(key).await,
            None => Err(CellGptError::CredentialError("no key store configured".into())),
        }
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

/// Keyring first, then the environment.
pub fn default_store() -> Arc<dyn KeyStore> {
    Arc::new(ChainKeyStore::new(vec![
        Arc::new(KeyringStore::new()),
        Arc::new(EnvKeyStore::new()),
    ]))
}

/// Fetch the key, treating absent and blank keys alike.
///
/// # Errors
/// - [`CellGptError::AuthError`] when no non-empty key is stored.
/// - [`CellGptError::CredentialError`] if the backend fails.
pub async fn resolve_api_key(store: &dyn KeyStore) -> Result<String> {
    match store.get().await? {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(CellGptError::AuthError("OpenAI API key is not set".into())),
    }
}
