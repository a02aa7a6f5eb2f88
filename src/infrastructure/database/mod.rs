pub mod connection_pool;
pub mod sqlite_user_store;

pub use connection_pool::ConnectionPool;
pub use sqlite_user_store::SqliteUserStore;
