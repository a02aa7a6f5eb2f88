use crate::application::ports::remote_directory::{RemoteDirectory, UserFilters};
use crate::application::ports::secure_store::{SecureStore, LAST_SYNC_KEY};
use crate::application::ports::user_store::UserStore;
use crate::domain::entities::{SyncOutcome, SyncStatus};
use crate::shared::config::SyncConfig;
use crate::shared::error::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One-way pull of the authoritative user list into the local store.
/// Upsert-by-primary-key, remote wins. Passes are serialized through an
/// in-flight flag; a request arriving mid-pass is rejected as busy rather
/// than cancelling or interleaving writes.
pub struct ReconciliationEngine {
    remote: Arc<dyn RemoteDirectory>,
    local: Arc<dyn UserStore>,
    secure: Arc<dyn SecureStore>,
    status: Arc<RwLock<SyncStatus>>,
    min_interval: Duration,
}

impl Clone for ReconciliationEngine {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            local: self.local.clone(),
            secure: self.secure.clone(),
            status: self.status.clone(),
            min_interval: self.min_interval,
        }
    }
}

impl ReconciliationEngine {
    pub fn new(
        remote: Arc<dyn RemoteDirectory>,
        local: Arc<dyn UserStore>,
        secure: Arc<dyn SecureStore>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            remote,
            local,
            secure,
            status: Arc::new(RwLock::new(SyncStatus::default())),
            min_interval: Duration::from_secs(config.min_interval_secs),
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Runs a reconciliation pass. A non-forced pass is throttled by the
    /// persisted cursor; a forced pass (post-login, explicit user action)
    /// always goes to the network.
    pub async fn sync(&self, force: bool) -> Result<SyncOutcome> {
        {
            let mut status = self.status.write().await;
            if status.is_syncing {
                return Ok(SyncOutcome::skipped("sync already in progress"));
            }
            status.is_syncing = true;
        }

        let result = self.run_pass(force).await;

        let mut status = self.status.write().await;
        status.is_syncing = false;
        match result {
            Ok(outcome) => {
                if let SyncOutcome::Completed { succeeded, .. } = &outcome {
                    if *succeeded > 0 {
                        status.last_sync = Some(Utc::now().timestamp());
                    }
                }
                status.last_outcome = Some(outcome.clone());
                Ok(outcome)
            }
            Err(err) => {
                status.sync_errors += 1;
                Err(err)
            }
        }
    }

    /// Detached pass for the post-login and startup paths: the outcome is
    /// logged and folded into `status()`, never surfaced to the caller that
    /// spawned it.
    pub fn spawn_detached(&self, force: bool) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.sync(force).await {
                Ok(outcome) => debug!(?outcome, force, "background sync finished"),
                Err(err) => warn!("background sync failed: {err}"),
            }
        })
    }

    async fn run_pass(&self, force: bool) -> Result<SyncOutcome> {
        if !force && self.recently_synced().await? {
            return Ok(SyncOutcome::skipped("recently synced"));
        }

        let users = match self.remote.list_users(&UserFilters::default()).await {
            Ok(users) => users,
            // A payload we cannot decode is "nothing to reconcile", not a
            // failure of the pass.
            Err(AppError::Serialization(err)) => {
                warn!("remote user list was malformed: {err}");
                return Ok(SyncOutcome::skipped("no data"));
            }
            Err(err) => return Err(err),
        };

        if users.is_empty() {
            return Ok(SyncOutcome::skipped("no data"));
        }

        let report = self.local.bulk_upsert(&users).await?;
        if report.failed > 0 {
            warn!(
                failed = report.failed,
                errors = ?report.errors,
                "some records failed to reconcile"
            );
        }

        if report.synced > 0 {
            self.secure
                .store(LAST_SYNC_KEY, &Utc::now().timestamp().to_string())
                .await?;
        }

        Ok(SyncOutcome::Completed {
            succeeded: report.synced,
            failed: report.failed,
            total: report.total(),
        })
    }

    async fn recently_synced(&self) -> Result<bool> {
        let Some(raw) = self.secure.retrieve(LAST_SYNC_KEY).await? else {
            return Ok(false);
        };
        // An unreadable cursor just means we sync again.
        let Ok(last) = raw.trim().parse::<i64>() else {
            return Ok(false);
        };
        let age = Utc::now().timestamp() - last;
        Ok(age < self.min_interval.as_secs() as i64)
    }
}
