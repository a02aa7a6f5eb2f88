pub mod credential_broker;
pub mod health_monitor;
pub mod reconciliation;

pub use credential_broker::CredentialBroker;
pub use health_monitor::{ConnectionMode, HealthMonitor};
pub use reconciliation::ReconciliationEngine;
