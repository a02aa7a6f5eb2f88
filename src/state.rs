use crate::application::ports::remote_directory::RemoteDirectory;
use crate::application::ports::secure_store::SecureStore;
use crate::application::ports::user_store::UserStore;
use crate::application::services::{CredentialBroker, HealthMonitor, ReconciliationEngine};
use crate::domain::entities::Session;
use crate::infrastructure::database::{ConnectionPool, SqliteUserStore};
use crate::infrastructure::remote::HttpRemoteDirectory;
use crate::infrastructure::storage::KeyringSecureStore;
use crate::shared::config::AppConfig;
use crate::shared::error::{AppError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// The application's service graph, built once at process start. Services
/// are explicit objects wired here; nothing lives in module-level state.
pub struct AppContext {
    pub config: AppConfig,
    pub user_store: Arc<dyn UserStore>,
    pub remote: Arc<dyn RemoteDirectory>,
    pub secure_store: Arc<dyn SecureStore>,
    pub health: Arc<HealthMonitor>,
    pub reconciler: Arc<ReconciliationEngine>,
    pub broker: Arc<CredentialBroker>,
    pool: Option<ConnectionPool>,
}

impl AppContext {
    /// Builds the production graph: SQLite store (initialized and seeded),
    /// HTTP remote, OS-keychain session storage.
    pub async fn init(config: AppConfig) -> Result<Self> {
        config.validate().map_err(AppError::Configuration)?;
        ensure_database_dir(&config.database.url)?;

        let pool = ConnectionPool::new(&config.database.url, config.database.max_connections)
            .await
            .map_err(AppError::from)?;
        let user_store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(
            pool.clone(),
            config.sync.error_sample_size,
        ));
        user_store.initialize().await?;
        info!(url = %config.database.url, "local store ready");

        let remote: Arc<dyn RemoteDirectory> = Arc::new(HttpRemoteDirectory::new(&config.remote)?);
        let secure_store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());

        Ok(Self::wire(config, Some(pool), user_store, remote, secure_store))
    }

    /// Wires the service graph around injected boundary implementations.
    /// Platform shells and tests use this to swap any edge.
    pub fn wire(
        config: AppConfig,
        pool: Option<ConnectionPool>,
        user_store: Arc<dyn UserStore>,
        remote: Arc<dyn RemoteDirectory>,
        secure_store: Arc<dyn SecureStore>,
    ) -> Self {
        let health = Arc::new(HealthMonitor::new(remote.clone(), &config.health));
        let reconciler = Arc::new(ReconciliationEngine::new(
            remote.clone(),
            user_store.clone(),
            secure_store.clone(),
            &config.sync,
        ));
        let broker = Arc::new(CredentialBroker::new(
            remote.clone(),
            user_store.clone(),
            secure_store.clone(),
            health.clone(),
            reconciler.clone(),
        ));

        Self {
            config,
            user_store,
            remote,
            secure_store,
            health,
            reconciler,
            broker,
            pool,
        }
    }

    /// App-start flow: probe connectivity, restore any persisted session,
    /// then opportunistically refresh the local store in the background.
    pub async fn startup(&self) -> Result<Option<Session>> {
        let mode = self.health.probe().await;
        info!(mode = mode.as_str(), "startup connectivity probe finished");

        let session = self.broker.restore_session().await?;
        match &session {
            Some(session) => debug!(user = %session.user.email, "session restored"),
            None => debug!("no session to restore"),
        }

        if self.config.sync.auto_sync {
            self.reconciler.spawn_detached(false);
        }

        Ok(session)
    }

    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        info!("local store closed");
    }
}

/// SQLite will not create missing directories for file-backed databases.
fn ensure_database_dir(url: &str) -> Result<()> {
    let Some(path) = url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = path.trim_start_matches("//");
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|err| AppError::Storage(format!("Failed to create data dir: {err}")))?;
        }
    }
    Ok(())
}
