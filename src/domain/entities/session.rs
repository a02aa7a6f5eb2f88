use super::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the session was established. A session created against the local
/// store stays `Local` until the next explicit login succeeds online.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Remote,
    Local,
}

/// Locally persisted proof of authentication. At most one session is
/// persisted at a time (single-user device assumption).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub source: SessionSource,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn remote(user: User, token: String) -> Self {
        Self {
            token,
            user,
            source: SessionSource::Remote,
            established_at: Utc::now(),
        }
    }

    /// Offline sessions mint their own opaque token; it carries no claims
    /// and is never presented to the remote.
    pub fn local(user: User) -> Self {
        Self {
            token: format!("local-{}", Uuid::new_v4()),
            user,
            source: SessionSource::Local,
            established_at: Utc::now(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.source == SessionSource::Local
    }
}
