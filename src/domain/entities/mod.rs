pub mod session;
pub mod sync;
pub mod user;

pub use session::{Session, SessionSource};
pub use sync::{BulkUpsertReport, SyncOutcome, SyncStatus};
pub use user::{User, UserRole};
