use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Timeout for data calls (login, profile, user listing), in seconds.
    pub request_timeout: u64,
    /// Timeout for health probes, in seconds.
    pub health_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    /// Minimum age of the sync cursor before a non-forced pass runs.
    pub min_interval_secs: u64,
    /// How many per-record errors a bulk upsert report retains.
    pub error_sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub max_retries: u32,
    /// Linear backoff step between health attempts, in seconds.
    pub backoff_step_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/tillsync.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            remote: RemoteConfig {
                base_url: "https://pos-backend.vercel.app/api".to_string(),
                request_timeout: 15,
                health_timeout: 10,
            },
            sync: SyncConfig {
                auto_sync: true,
                min_interval_secs: 3600, // 1 hour
                error_sample_size: 10,
            },
            health: HealthConfig {
                max_retries: 3,
                backoff_step_secs: 2,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TILLSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("TILLSYNC_REMOTE_URL") {
            if !v.trim().is_empty() {
                cfg.remote.base_url = v;
            }
        }
        if let Ok(v) = std::env::var("TILLSYNC_REQUEST_TIMEOUT_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.request_timeout = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TILLSYNC_HEALTH_TIMEOUT_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.health_timeout = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TILLSYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Ok(v) = std::env::var("TILLSYNC_SYNC_INTERVAL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.min_interval_secs = value;
            }
        }
        if let Ok(v) = std::env::var("TILLSYNC_HEALTH_MAX_RETRIES") {
            if let Some(value) = parse_u64(&v) {
                cfg.health.max_retries = (value as u32).max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.remote.base_url.trim().is_empty() {
            return Err("Remote base_url must not be empty".to_string());
        }
        if self.remote.request_timeout == 0 || self.remote.health_timeout == 0 {
            return Err("Remote timeouts must be greater than 0".to_string());
        }
        if self.health.max_retries == 0 {
            return Err("Health max_retries must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
