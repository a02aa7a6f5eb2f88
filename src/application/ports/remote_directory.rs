use crate::domain::entities::{User, UserRole};
use crate::shared::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Successful remote authentication: the authoritative user record plus an
/// opaque bearer token.
#[derive(Debug, Clone)]
pub struct RemoteSession {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserFilters {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub secret: String,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub database_connected: bool,
    pub status: String,
}

impl HealthReport {
    /// Healthy means the service reports healthy AND its database is
    /// reachable; a responding server with a dead database is not usable.
    pub fn is_usable(&self) -> bool {
        self.healthy && self.database_connected
    }
}

/// Opaque network boundary to the authoritative backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// `InvalidCredentials` on an authoritative 401 rejection,
    /// `ServerUnavailable` on 5xx/timeout/connect failure.
    async fn login(&self, email: &str, secret: &str) -> Result<RemoteSession>;

    async fn fetch_profile(&self, token: &str) -> Result<User>;

    async fn list_users(&self, filters: &UserFilters) -> Result<Vec<User>>;

    async fn register(&self, registration: &Registration) -> Result<RemoteSession>;

    async fn logout(&self, token: &str) -> Result<()>;

    async fn health_check(&self) -> Result<HealthReport>;
}
