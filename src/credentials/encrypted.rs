//! OS credential store backend.
//!
//! Uses the `keyring` crate which provides OS-appropriate secure storage:
//! - **macOS**: Keychain
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)
//! - **Windows**: Windows Credential Manager

use async_trait::async_trait;

use super::KeyStore;
use crate::error::{CellGptError, Result};

/// Service name for cellgpt credentials in the platform store.
pub const SERVICE_NAME: &str = "cellgpt";

/// Account under which the API key is stored.
pub const API_KEY_ACCOUNT: &str = "openai.api_key";

/// [`KeyStore`] backed by the platform credential store.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    /// Store under the default service and account.
    #[must_use]
    pub fn new() -> Self {
        Self::with_account(SERVICE_NAME, API_KEY_ACCOUNT)
    }

    /// Store under a custom service and account.
    pub fn with_account(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(service: &str, account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, account).map_err(|e| {
            CellGptError::CredentialError(format!("failed to create keyring entry: {e}"))
        })
    }

    /// Remove the stored key. Missing entries are not an error.
    pub async fn delete(&self) -> Result<()> {
        let (service, account) = (self.service.clone(), self.account.clone());
        run_blocking(move || {
            match Self::entry(&service, &account)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(CellGptError::CredentialError(format!(
                    "failed to delete credential: {e}"
                ))),
            }
        })
        .await
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for KeyringStore {
    async fn get(&self) -> Result<Option<String>> {
        let (service, account) = (self.service.clone(), self.account.clone());
        run_blocking(move || match Self::entry(&service, &account)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CellGptError::CredentialError(format!(
                "failed to retrieve credential: {e}"
            ))),
        })
        .await
    }

    async fn set(&self, key: &str) -> Result<()> {
        let (service, account) = (self.service.clone(), self.account.clone());
        let key = key.to_string();
        run_blocking(move || {
            Self::entry(&service, &account)?
                .set_password(&key)
                .map_err(|e| CellGptError::CredentialError(format!("failed to store credential: {e}")))
        })
        .await?;
        tracing::info!(service = %self.service, account = %self.account, "API key stored");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}

/// Platform stores may block on IPC; keep them off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CellGptError::CredentialError(format!("keyring task failed: {e}")))?
}
