use crate::domain::entities::{BulkUpsertReport, User};
use crate::shared::error::Result;
use async_trait::async_trait;

/// Durable, queryable local copy of user records; source of truth when
/// offline. All writers go through this port so the uniqueness and upsert
/// invariants hold.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Idempotent: creates the schema if absent and seeds demo users into
    /// an empty table. Safe to call multiple times.
    async fn initialize(&self) -> Result<()>;

    /// Case-insensitive email match plus secret match, filtered to active
    /// users. Updates `last_login_at` on success. `None` when no match.
    async fn authenticate(&self, email: &str, secret: &str) -> Result<Option<User>>;

    /// Insert-or-replace keyed by `id`. Fails with a validation error when
    /// required fields are missing.
    async fn upsert(&self, user: &User) -> Result<User>;

    /// All upserts in one transaction. Per-record failures are counted and
    /// sampled without aborting the batch; transaction-level failures roll
    /// everything back and propagate.
    async fn bulk_upsert(&self, users: &[User]) -> Result<BulkUpsertReport>;

    async fn get_all(&self) -> Result<Vec<User>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// "Delete" is modeled as deactivation; records are never hard-deleted
    /// by normal flows.
    async fn set_active(&self, id: &str, active: bool) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}
