use crate::application::ports::secure_store::SecureStore;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use keyring::Entry;

const SERVICE_NAME: &str = "tillsync";

/// OS-keychain implementation of the session/cursor storage. Values are
/// opaque strings; the keychain gives us at-rest protection for the token
/// without inventing our own encryption.
pub struct KeyringSecureStore;

impl KeyringSecureStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(key: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, key)
            .map_err(|err| AppError::Storage(format!("Failed to create keyring entry: {err}")))
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn store(&self, key: &str, value: &str) -> Result<()> {
        Self::entry(key)?
            .set_password(value)
            .map_err(|err| AppError::Storage(format!("Failed to store {key}: {err}")))
    }

    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(AppError::Storage(format!("Failed to read {key}: {err}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match Self::entry(key)?.delete_credential() {
            // Already deleted is fine.
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(AppError::Storage(format!("Failed to delete {key}: {err}"))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match Self::entry(key)?.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(AppError::Storage(format!("Failed to probe {key}: {err}"))),
        }
    }
}
