use crate::shared::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Cashier,
    Manager,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Cashier => "cashier",
            UserRole::Manager => "manager",
            UserRole::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cashier" => Ok(UserRole::Cashier),
            "manager" => Ok(UserRole::Manager),
            "super_admin" => Ok(UserRole::SuperAdmin),
            other => Err(AppError::Validation(format!("Unknown role: {other}"))),
        }
    }
}

/// The reconciled identity record. One shape everywhere: remote JSON and
/// SQL rows are normalized into this struct at their respective boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Opaque credential blob; a hash in production data, plaintext in the
    /// demo seed.
    pub credential_secret: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, name: String, email: String, secret: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            email,
            credential_secret: secret,
            role,
            phone: None,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    /// Required-field check applied before any row write.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::Validation("User id must not be empty".into()));
        }
        if self.email.trim().is_empty() {
            return Err(AppError::Validation("User email must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("User name must not be empty".into()));
        }
        Ok(())
    }
}

/// Shape check applied before any I/O on the login and registration paths.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}
