use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// Connectivity-classified failures are retryable and fallback-eligible:
    /// they trigger the local login fallback and offline-mode flips.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, AppError::ServerUnavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Serialization(err.to_string())
        } else {
            // Timeouts, connect failures and request build errors all count
            // as the remote being unreachable.
            AppError::ServerUnavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
