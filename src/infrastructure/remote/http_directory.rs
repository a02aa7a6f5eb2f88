use crate::application::ports::remote_directory::{
    HealthReport, Registration, RemoteDirectory, RemoteSession, UserFilters,
};
use crate::domain::entities::User;
use crate::shared::config::RemoteConfig;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

/// HTTP client for the authoritative backend. Responses are normalized into
/// domain types here and nowhere else; callers never see wire shapes or raw
/// transport errors.
pub struct HttpRemoteDirectory {
    client: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
}

/// Wire shape of a user record. The backend has drifted between camelCase
/// and snake_case field names and between `role` and `position`; the
/// aliases resolve that drift in exactly one place.
#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    name: String,
    email: String,
    /// Present on sync payloads, absent on profile responses.
    #[serde(default, alias = "password", alias = "password_hash")]
    credential_secret: Option<String>,
    #[serde(alias = "position")]
    role: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default = "default_true", alias = "isActive")]
    is_active: bool,
    #[serde(default, alias = "lastLoginAt")]
    last_login_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "createdAt")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl RemoteUser {
    fn into_user(self) -> Result<User> {
        let role = self.role.parse()?;
        let now = Utc::now();
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            credential_secret: self.credential_secret.unwrap_or_default(),
            role,
            phone: self.phone,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: RemoteUser,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user: RemoteUser,
}

#[derive(Debug, Deserialize)]
struct UserListResponse {
    #[serde(default)]
    users: Vec<RemoteUser>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    database: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
}

/// Maps an unhappy HTTP status onto the error taxonomy: 401 is an
/// authoritative rejection, 400/409 are request-shape problems, anything
/// 5xx means the server is unreachable for our purposes.
fn classify_status(status: StatusCode, context: &str, detail: Option<String>) -> AppError {
    let detail = detail.unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        StatusCode::UNAUTHORIZED => AppError::InvalidCredentials,
        StatusCode::NOT_FOUND => AppError::NotFound(format!("{context}: {detail}")),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => AppError::Validation(detail),
        _ => AppError::ServerUnavailable(format!("{context}: {detail}")),
    }
}

fn database_connected(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(connected) => *connected,
        serde_json::Value::String(state) => state == "connected",
        _ => false,
    }
}

impl HttpRemoteDirectory {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|err| AppError::Configuration(format!("HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_timeout: Duration::from_secs(config.health_timeout),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        Err(classify_status(status, context, detail))
    }
}

#[async_trait]
impl RemoteDirectory for HttpRemoteDirectory {
    async fn login(&self, email: &str, secret: &str) -> Result<RemoteSession> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": secret }))
            .send()
            .await?;

        let auth: AuthResponse = Self::decode(response, "login").await?;
        Ok(RemoteSession {
            user: auth.user.into_user()?,
            token: auth.token,
        })
    }

    async fn fetch_profile(&self, token: &str) -> Result<User> {
        let response = self
            .client
            .get(self.url("/auth/profile"))
            .bearer_auth(token)
            .send()
            .await?;

        let profile: ProfileResponse = Self::decode(response, "profile").await?;
        profile.user.into_user()
    }

    async fn list_users(&self, filters: &UserFilters) -> Result<Vec<User>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(role) = filters.role {
            query.push(("role", role.as_str().to_string()));
        }
        if let Some(is_active) = filters.is_active {
            query.push(("is_active", is_active.to_string()));
        }
        if let Some(limit) = filters.limit {
            query.push(("limit", limit.to_string()));
        }

        let response = self
            .client
            .get(self.url("/sync/users"))
            .query(&query)
            .send()
            .await?;

        let listing: UserListResponse = Self::decode(response, "user listing").await?;

        let mut users = Vec::with_capacity(listing.users.len());
        for remote_user in listing.users {
            match remote_user.into_user() {
                Ok(user) => users.push(user),
                // One unreadable record must not sink the whole listing.
                Err(err) => warn!("skipping unreadable remote user record: {err}"),
            }
        }
        Ok(users)
    }

    async fn register(&self, registration: &Registration) -> Result<RemoteSession> {
        let mut body = json!({
            "name": registration.name,
            "email": registration.email,
            "password": registration.secret,
        });
        if let Some(phone) = &registration.phone {
            body["phone"] = json!(phone);
        }
        if let Some(role) = registration.role {
            body["role"] = json!(role.as_str());
        }

        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&body)
            .send()
            .await?;

        let auth: AuthResponse = Self::decode(response, "register").await?;
        Ok(RemoteSession {
            user: auth.user.into_user()?,
            token: auth.token,
        })
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify_status(response.status(), "logout", None))
        }
    }

    async fn health_check(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(self.health_timeout)
            .send()
            .await?;

        let health: HealthResponse = Self::decode(response, "health").await?;
        Ok(HealthReport {
            healthy: health.status == "healthy",
            database_connected: database_connected(&health.database),
            status: health.status,
        })
    }
}
