use crate::shared::error::Result;
use async_trait::async_trait;

/// Fixed storage key for the persisted session blob.
pub const SESSION_KEY: &str = "session";
/// Fixed storage key for the reconciliation cursor (unix timestamp).
pub const LAST_SYNC_KEY: &str = "last_sync_at";

/// Opaque key-value string storage for the session token/user blob and the
/// sync cursor. Backed by the OS keychain in production.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn store(&self, key: &str, value: &str) -> Result<()>;
    async fn retrieve(&self, key: &str) -> Result<Option<String>>;
    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}
