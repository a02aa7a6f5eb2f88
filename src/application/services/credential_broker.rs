use crate::application::ports::remote_directory::{Registration, RemoteDirectory};
use crate::application::ports::secure_store::{SecureStore, SESSION_KEY};
use crate::application::ports::user_store::UserStore;
use crate::application::services::health_monitor::HealthMonitor;
use crate::application::services::reconciliation::ReconciliationEngine;
use crate::domain::entities::user::is_valid_email;
use crate::domain::entities::Session;
use crate::shared::error::{AppError, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single entry point for establishing and restoring a session. Tries the
/// remote authority first and falls back to the local store only on
/// connectivity failures; an authoritative rejection never falls back.
pub struct CredentialBroker {
    remote: Arc<dyn RemoteDirectory>,
    local: Arc<dyn UserStore>,
    secure: Arc<dyn SecureStore>,
    health: Arc<HealthMonitor>,
    reconciler: Arc<ReconciliationEngine>,
}

impl CredentialBroker {
    pub fn new(
        remote: Arc<dyn RemoteDirectory>,
        local: Arc<dyn UserStore>,
        secure: Arc<dyn SecureStore>,
        health: Arc<HealthMonitor>,
        reconciler: Arc<ReconciliationEngine>,
    ) -> Self {
        Self {
            remote,
            local,
            secure,
            health,
            reconciler,
        }
    }

    pub async fn login(&self, email: &str, secret: &str) -> Result<Session> {
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email format".into()));
        }
        if secret.is_empty() {
            return Err(AppError::Validation("Password must not be empty".into()));
        }

        match self.remote.login(email, secret).await {
            Ok(remote_session) => {
                let session = Session::remote(remote_session.user, remote_session.token);
                // The credential write is awaited: a session the caller holds
                // is always the session on disk.
                self.persist_session(&session).await?;
                info!(user = %session.user.email, "login established online");
                self.reconciler.spawn_detached(true);
                Ok(session)
            }
            Err(err) if err.is_connectivity() => {
                warn!("remote login unreachable, falling back to local store: {err}");
                match self.local.authenticate(email, secret).await? {
                    Some(user) => {
                        let session = Session::local(user);
                        self.persist_session(&session).await?;
                        info!(user = %session.user.email, "login established offline");
                        Ok(session)
                    }
                    None => Err(AppError::InvalidCredentials),
                }
            }
            // A reachable server rejecting credentials is authoritative:
            // no local fallback.
            Err(err) => Err(err),
        }
    }

    /// Restores any persisted session on app start. Online mode re-verifies
    /// the token against the remote; offline mode trusts the session as-is
    /// (availability over freshness).
    pub async fn restore_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.read_session().await? else {
            return Ok(None);
        };

        if !self.health.is_online().await {
            debug!("offline mode: trusting persisted session");
            return Ok(Some(session));
        }

        match self.remote.fetch_profile(&session.token).await {
            Ok(user) => {
                let refreshed = Session { user, ..session };
                self.persist_session(&refreshed).await?;
                Ok(Some(refreshed))
            }
            Err(err) if err.is_connectivity() => {
                // The server vanished between the probe and this call; the
                // monitor will flip the mode on its next pass.
                warn!("session re-verification unreachable, keeping session: {err}");
                Ok(Some(session))
            }
            Err(err) => {
                info!("session re-verification rejected, clearing: {err}");
                self.secure.delete(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    /// The persisted session without any re-verification.
    pub async fn current_session(&self) -> Result<Option<Session>> {
        self.read_session().await
    }

    /// Clears the local session first so the user is logged out even when
    /// the network is down, then best-effort notifies the remote.
    pub async fn logout(&self) -> Result<()> {
        let token = self.read_session().await?.map(|session| session.token);
        self.secure.delete(SESSION_KEY).await?;

        if let Some(token) = token {
            if let Err(err) = self.remote.logout(&token).await {
                debug!("logout notification failed: {err}");
            }
        }
        info!("session cleared");
        Ok(())
    }

    /// Registration requires connectivity; there is no offline queueing.
    pub async fn register(&self, registration: &Registration) -> Result<Session> {
        if registration.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".into()));
        }
        if !is_valid_email(&registration.email) {
            return Err(AppError::Validation("Invalid email format".into()));
        }
        if registration.secret.is_empty() {
            return Err(AppError::Validation("Password must not be empty".into()));
        }
        if !self.health.is_online().await {
            return Err(AppError::ServerUnavailable(
                "registration requires a network connection".into(),
            ));
        }

        let remote_session = self.remote.register(registration).await?;
        let session = Session::remote(remote_session.user, remote_session.token);
        self.persist_session(&session).await?;

        // Mirror the new record so the account can log in offline before the
        // next reconciliation pass.
        if let Err(err) = self.local.upsert(&session.user).await {
            warn!("could not mirror registered user locally: {err}");
        }

        Ok(session)
    }

    async fn persist_session(&self, session: &Session) -> Result<()> {
        let blob = serde_json::to_string(session)?;
        self.secure.store(SESSION_KEY, &blob).await
    }

    async fn read_session(&self) -> Result<Option<Session>> {
        let Some(raw) = self.secure.retrieve(SESSION_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                warn!("persisted session is unreadable, clearing: {err}");
                self.secure.delete(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::remote_directory::{
        MockRemoteDirectory, RemoteSession, UserFilters,
    };
    use crate::application::ports::secure_store::MockSecureStore;
    use crate::application::ports::user_store::MockUserStore;
    use crate::application::services::health_monitor::ConnectionMode;
    use crate::domain::entities::{SessionSource, User, UserRole};
    use crate::shared::config::{HealthConfig, SyncConfig};
    use mockall::predicate::eq;

    fn sample_user(role: UserRole) -> User {
        User::new(
            "usr-1".into(),
            "Admin User".into(),
            "admin@techcorp.com".into(),
            "password123".into(),
            role,
        )
    }

    struct BrokerParts {
        remote: MockRemoteDirectory,
        local: MockUserStore,
        secure: MockSecureStore,
        mode: ConnectionMode,
        // Second remote used by the monitor/reconciler wiring.
        background_remote: MockRemoteDirectory,
    }

    impl Default for BrokerParts {
        fn default() -> Self {
            Self {
                remote: MockRemoteDirectory::new(),
                local: MockUserStore::new(),
                secure: MockSecureStore::new(),
                mode: ConnectionMode::Offline,
                background_remote: MockRemoteDirectory::new(),
            }
        }
    }

    impl BrokerParts {
        async fn build(self) -> CredentialBroker {
            let remote: Arc<dyn RemoteDirectory> = Arc::new(self.remote);
            let local: Arc<dyn UserStore> = Arc::new(self.local);
            let secure: Arc<dyn SecureStore> = Arc::new(self.secure);
            let background_remote: Arc<dyn RemoteDirectory> = Arc::new(self.background_remote);

            let health = Arc::new(HealthMonitor::new(
                background_remote.clone(),
                &HealthConfig {
                    max_retries: 1,
                    backoff_step_secs: 1,
                },
            ));
            health.set_mode(self.mode).await;

            let reconciler = Arc::new(ReconciliationEngine::new(
                background_remote,
                local.clone(),
                secure.clone(),
                &SyncConfig {
                    auto_sync: true,
                    min_interval_secs: 3600,
                    error_sample_size: 10,
                },
            ));

            CredentialBroker::new(remote, local, secure, health, reconciler)
        }
    }

    fn persisted_session_json(source: SessionSource) -> String {
        let user = sample_user(UserRole::SuperAdmin);
        let session = match source {
            SessionSource::Remote => Session::remote(user, "jwt-token".into()),
            SessionSource::Local => Session::local(user),
        };
        serde_json::to_string(&session).unwrap()
    }

    #[tokio::test]
    async fn login_validates_email_before_any_io() {
        let mut parts = BrokerParts::default();
        parts.remote.expect_login().times(0);
        parts.local.expect_authenticate().times(0);

        let broker = parts.build().await;
        let result = broker.login("not-an-email", "password123").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn connectivity_failure_falls_back_to_local_store() {
        let mut parts = BrokerParts::default();
        parts
            .remote
            .expect_login()
            .times(1)
            .returning(|_, _| Err(AppError::ServerUnavailable("timeout".into())));
        parts
            .local
            .expect_authenticate()
            .with(eq("admin@techcorp.com"), eq("password123"))
            .times(1)
            .returning(|_, _| Ok(Some(sample_user(UserRole::SuperAdmin))));
        parts
            .secure
            .expect_store()
            .times(1)
            .returning(|_, _| Ok(()));

        let broker = parts.build().await;
        let session = broker.login("admin@techcorp.com", "password123").await.unwrap();

        assert_eq!(session.source, SessionSource::Local);
        assert_eq!(session.user.role, UserRole::SuperAdmin);
        assert!(session.token.starts_with("local-"));
    }

    #[tokio::test]
    async fn confirmed_rejection_never_falls_back() {
        let mut parts = BrokerParts::default();
        parts
            .remote
            .expect_login()
            .times(1)
            .returning(|_, _| Err(AppError::InvalidCredentials));
        // A local match exists, but must not be consulted.
        parts.local.expect_authenticate().times(0);
        parts.secure.expect_store().times(0);

        let broker = parts.build().await;
        let result = broker.login("admin@techcorp.com", "wrong-password").await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn no_local_match_surfaces_invalid_credentials() {
        let mut parts = BrokerParts::default();
        parts
            .remote
            .expect_login()
            .times(1)
            .returning(|_, _| Err(AppError::ServerUnavailable("connect refused".into())));
        parts
            .local
            .expect_authenticate()
            .times(1)
            .returning(|_, _| Ok(None));

        let broker = parts.build().await;
        let result = broker.login("ghost@techcorp.com", "password123").await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn online_login_persists_before_returning_and_triggers_sync() {
        let mut parts = BrokerParts::default();
        parts.remote.expect_login().times(1).returning(|_, _| {
            Ok(RemoteSession {
                user: sample_user(UserRole::Manager),
                token: "jwt-token".into(),
            })
        });
        parts
            .secure
            .expect_store()
            .withf(|key, blob| key == SESSION_KEY && blob.contains("jwt-token"))
            .times(1)
            .returning(|_, _| Ok(()));

        // Background forced sync reaches the reconciler's remote.
        parts
            .background_remote
            .expect_list_users()
            .returning(|_: &UserFilters| Ok(vec![]));
        parts.secure.expect_retrieve().returning(|_| Ok(None));

        let broker = parts.build().await;
        let session = broker.login("manager@techcorp.com", "password123").await.unwrap();

        assert_eq!(session.source, SessionSource::Remote);
        assert_eq!(session.token, "jwt-token");
    }

    #[tokio::test]
    async fn failed_session_write_fails_the_login() {
        let mut parts = BrokerParts::default();
        parts.remote.expect_login().times(1).returning(|_, _| {
            Ok(RemoteSession {
                user: sample_user(UserRole::Manager),
                token: "jwt-token".into(),
            })
        });
        parts
            .secure
            .expect_store()
            .times(1)
            .returning(|_, _| Err(AppError::Storage("keychain locked".into())));

        let broker = parts.build().await;
        let result = broker.login("manager@techcorp.com", "password123").await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn restore_offline_trusts_persisted_session() {
        let mut parts = BrokerParts::default();
        parts.mode = ConnectionMode::Offline;
        parts
            .secure
            .expect_retrieve()
            .with(eq(SESSION_KEY))
            .times(1)
            .returning(|_| Ok(Some(persisted_session_json(SessionSource::Local))));
        parts.remote.expect_fetch_profile().times(0);

        let broker = parts.build().await;
        let session = broker.restore_session().await.unwrap().unwrap();
        assert_eq!(session.source, SessionSource::Local);
    }

    #[tokio::test]
    async fn restore_online_clears_session_on_rejection() {
        let mut parts = BrokerParts::default();
        parts.mode = ConnectionMode::Online;
        parts
            .secure
            .expect_retrieve()
            .times(1)
            .returning(|_| Ok(Some(persisted_session_json(SessionSource::Remote))));
        parts
            .remote
            .expect_fetch_profile()
            .with(eq("jwt-token"))
            .times(1)
            .returning(|_| Err(AppError::InvalidCredentials));
        parts
            .secure
            .expect_delete()
            .with(eq(SESSION_KEY))
            .times(1)
            .returning(|_| Ok(()));

        let broker = parts.build().await;
        assert!(broker.restore_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_online_refreshes_user_copy() {
        let mut parts = BrokerParts::default();
        parts.mode = ConnectionMode::Online;
        parts
            .secure
            .expect_retrieve()
            .times(1)
            .returning(|_| Ok(Some(persisted_session_json(SessionSource::Remote))));
        parts.remote.expect_fetch_profile().times(1).returning(|_| {
            let mut user = sample_user(UserRole::SuperAdmin);
            user.name = "Renamed Admin".into();
            Ok(user)
        });
        parts
            .secure
            .expect_store()
            .withf(|_, blob| blob.contains("Renamed Admin"))
            .times(1)
            .returning(|_, _| Ok(()));

        let broker = parts.build().await;
        let session = broker.restore_session().await.unwrap().unwrap();
        assert_eq!(session.user.name, "Renamed Admin");
        // Re-verification refreshes the copy; it does not re-establish.
        assert_eq!(session.source, SessionSource::Remote);
    }

    #[tokio::test]
    async fn logout_clears_locally_even_when_remote_fails() {
        let mut parts = BrokerParts::default();
        parts
            .secure
            .expect_retrieve()
            .times(1)
            .returning(|_| Ok(Some(persisted_session_json(SessionSource::Remote))));
        parts
            .secure
            .expect_delete()
            .with(eq(SESSION_KEY))
            .times(1)
            .returning(|_| Ok(()));
        parts
            .remote
            .expect_logout()
            .times(1)
            .returning(|_| Err(AppError::ServerUnavailable("offline".into())));

        let broker = parts.build().await;
        assert!(broker.logout().await.is_ok());
    }

    #[tokio::test]
    async fn register_requires_connectivity() {
        let mut parts = BrokerParts::default();
        parts.mode = ConnectionMode::Offline;
        parts.remote.expect_register().times(0);

        let broker = parts.build().await;
        let result = broker
            .register(&Registration {
                name: "New Cashier".into(),
                email: "new@techcorp.com".into(),
                secret: "password123".into(),
                phone: None,
                role: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::ServerUnavailable(_))));
    }

    #[tokio::test]
    async fn register_online_persists_and_mirrors_locally() {
        let mut parts = BrokerParts::default();
        parts.mode = ConnectionMode::Online;
        parts.remote.expect_register().times(1).returning(|_| {
            Ok(RemoteSession {
                user: sample_user(UserRole::Cashier),
                token: "fresh-token".into(),
            })
        });
        parts
            .secure
            .expect_store()
            .times(1)
            .returning(|_, _| Ok(()));
        parts
            .local
            .expect_upsert()
            .times(1)
            .returning(|user| Ok(user.clone()));

        let broker = parts.build().await;
        let session = broker
            .register(&Registration {
                name: "Admin User".into(),
                email: "admin@techcorp.com".into(),
                secret: "password123".into(),
                phone: None,
                role: Some(UserRole::Cashier),
            })
            .await
            .unwrap();
        assert_eq!(session.source, SessionSource::Remote);
        assert_eq!(session.token, "fresh-token");
    }
}
