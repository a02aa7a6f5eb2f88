pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::ports::remote_directory::{
    HealthReport, Registration, RemoteDirectory, RemoteSession, UserFilters,
};
pub use application::ports::secure_store::SecureStore;
pub use application::ports::user_store::UserStore;
pub use application::services::{ConnectionMode, CredentialBroker, HealthMonitor, ReconciliationEngine};
pub use domain::entities::{Session, SessionSource, SyncOutcome, SyncStatus, User, UserRole};
pub use shared::{AppConfig, AppError, Result};
pub use state::AppContext;

/// Installs the global tracing subscriber. Call once, before `AppContext::init`.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tillsync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
