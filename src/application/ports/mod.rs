pub mod remote_directory;
pub mod secure_store;
pub mod user_store;

pub use remote_directory::{HealthReport, Registration, RemoteDirectory, RemoteSession, UserFilters};
pub use secure_store::{SecureStore, LAST_SYNC_KEY, SESSION_KEY};
pub use user_store::UserStore;
