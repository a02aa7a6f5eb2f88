use crate::application::ports::remote_directory::{HealthReport, RemoteDirectory};
use crate::shared::config::HealthConfig;
use crate::shared::error::{AppError, Result};
use crate::shared::retry::{Backoff, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Online,
    Offline,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Online => "online",
            ConnectionMode::Offline => "offline",
        }
    }
}

/// Maintains the process-wide online/offline flag consumed by the
/// credential broker. Starts offline; the first successful probe flips it.
pub struct HealthMonitor {
    remote: Arc<dyn RemoteDirectory>,
    mode: RwLock<ConnectionMode>,
    retry: RetryPolicy,
}

impl HealthMonitor {
    pub fn new(remote: Arc<dyn RemoteDirectory>, config: &HealthConfig) -> Self {
        Self {
            remote,
            mode: RwLock::new(ConnectionMode::Offline),
            retry: RetryPolicy::new(
                config.max_retries,
                Backoff::Linear {
                    step: Duration::from_secs(config.backoff_step_secs),
                },
            ),
        }
    }

    pub async fn mode(&self) -> ConnectionMode {
        *self.mode.read().await
    }

    pub async fn is_online(&self) -> bool {
        self.mode().await == ConnectionMode::Online
    }

    /// Force a mode without probing. Used by the UI's explicit
    /// offline-mode toggle.
    pub async fn set_mode(&self, mode: ConnectionMode) {
        self.transition(mode).await;
    }

    /// Explicit health test: probes with bounded retries and propagates the
    /// failure to the caller. Connectivity failures (503, timeout) retry
    /// with linear backoff until the policy is exhausted. Either way the
    /// result is folded into the mode flag.
    pub async fn check_health(&self) -> Result<HealthReport> {
        let probed = self.retry.run(|| self.remote.health_check()).await;

        match probed {
            Ok(report) if report.is_usable() => {
                self.transition(ConnectionMode::Online).await;
                Ok(report)
            }
            Ok(report) => {
                self.transition(ConnectionMode::Offline).await;
                Err(AppError::ServerUnavailable(format!(
                    "remote degraded: status={} database_connected={}",
                    report.status, report.database_connected
                )))
            }
            Err(err) => {
                self.transition(ConnectionMode::Offline).await;
                Err(err)
            }
        }
    }

    /// Passive probe: swallows the error into the mode flip.
    pub async fn probe(&self) -> ConnectionMode {
        if let Err(err) = self.check_health().await {
            warn!("health probe failed: {err}");
        }
        self.mode().await
    }

    async fn transition(&self, next: ConnectionMode) {
        let mut mode = self.mode.write().await;
        if *mode != next {
            info!(from = mode.as_str(), to = next.as_str(), "connectivity mode changed");
            *mode = next;
        }
    }
}
