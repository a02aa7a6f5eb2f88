use crate::application::ports::user_store::UserStore;
use crate::domain::entities::{BulkUpsertReport, User, UserRole};
use crate::infrastructure::database::connection_pool::ConnectionPool;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

/// SQLite-backed local copy of the user directory. Owns the `users` schema,
/// the first-run demo seed, and the upsert semantics reconciliation relies
/// on.
pub struct SqliteUserStore {
    pool: ConnectionPool,
    error_sample_size: usize,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    credential_secret: String,
    role: String,
    phone: Option<String>,
    is_active: bool,
    last_login_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl UserRow {
    /// The one place a SQL row becomes a `User`.
    fn into_user(self) -> Result<User> {
        let role: UserRole = self.role.parse()?;
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            credential_secret: self.credential_secret,
            role,
            phone: self.phone,
            is_active: self.is_active,
            last_login_at: self.last_login_at.and_then(|ts| timestamp(ts).ok()),
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::Database(format!("Corrupt timestamp in users row: {secs}")))
}

fn is_constraint_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || db_err.is_check_violation()
                || db_err.is_foreign_key_violation()
        }
        _ => false,
    }
}

impl SqliteUserStore {
    pub fn new(pool: ConnectionPool, error_sample_size: usize) -> Self {
        Self {
            pool,
            error_sample_size,
        }
    }

    fn pool(&self) -> &SqlitePool {
        self.pool.get_pool()
    }

    async fn exec_upsert<'e, E>(executor: E, user: &User) -> std::result::Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, credential_secret, role, phone,
                is_active, last_login_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                credential_secret = excluded.credential_secret,
                role = excluded.role,
                phone = excluded.phone,
                is_active = excluded.is_active,
                last_login_at = excluded.last_login_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.credential_secret)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(user.is_active)
        .bind(user.last_login_at.map(|ts| ts.timestamp()))
        .bind(user.created_at.timestamp())
        .bind(user.updated_at.timestamp())
        .execute(executor)
        .await?;

        Ok(())
    }

    async fn seed_demo_users(&self) -> Result<()> {
        let demo = [
            (
                "demo-super-admin",
                "Admin User",
                "admin@techcorp.com",
                UserRole::SuperAdmin,
            ),
            (
                "demo-manager",
                "Store Manager",
                "manager@techcorp.com",
                UserRole::Manager,
            ),
            (
                "demo-cashier",
                "Front Cashier",
                "cashier@techcorp.com",
                UserRole::Cashier,
            ),
        ];

        for (id, name, email, role) in demo {
            let user = User::new(
                id.to_string(),
                name.to_string(),
                email.to_string(),
                "password123".to_string(),
                role,
            );
            Self::exec_upsert(self.pool(), &user).await?;
        }

        info!("seeded demo users into empty local store");
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL COLLATE NOCASE,
                credential_secret TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'cashier',
                phone TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_login_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email)")
            .execute(self.pool())
            .await?;

        if self.count().await? == 0 {
            self.seed_demo_users().await?;
        }

        Ok(())
    }

    async fn authenticate(&self, email: &str, secret: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE email = ?1 AND is_active = 1",
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut user = row.into_user()?;
        if user.credential_secret != secret {
            return Ok(None);
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(now.timestamp())
            .bind(&user.id)
            .execute(self.pool())
            .await?;
        user.last_login_at = Some(now);

        Ok(Some(user))
    }

    async fn upsert(&self, user: &User) -> Result<User> {
        user.validate()?;
        Self::exec_upsert(self.pool(), user).await?;
        self.get_by_id(&user.id)
            .await?
            .ok_or_else(|| AppError::Database(format!("Upserted row vanished: {}", user.id)))
    }

    async fn bulk_upsert(&self, users: &[User]) -> Result<BulkUpsertReport> {
        let mut report = BulkUpsertReport::default();
        let mut tx = self.pool().begin().await?;

        for user in users {
            if let Err(err) = user.validate() {
                report.record_failure(
                    format!("{}: {err}", display_key(user)),
                    self.error_sample_size,
                );
                continue;
            }
            match Self::exec_upsert(&mut *tx, user).await {
                Ok(()) => report.synced += 1,
                // A record-level constraint breach (say, an email colliding
                // with a different id) skips that record only.
                Err(err) if is_constraint_violation(&err) => {
                    report.record_failure(
                        format!("{}: {err}", display_key(user)),
                        self.error_sample_size,
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn get_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY name COLLATE NOCASE")
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(active)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User not found: {id}")));
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

fn display_key(user: &User) -> String {
    if user.id.trim().is_empty() {
        format!("<missing id: {}>", user.email)
    } else {
        user.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteUserStore {
        let pool = ConnectionPool::from_memory().await.unwrap();
        let store = SqliteUserStore::new(pool, 10);
        store.initialize().await.unwrap();
        store
    }

    fn new_user(id: &str, name: &str, email: &str) -> User {
        User::new(
            id.to_string(),
            name.to_string(),
            email.to_string(),
            "secret".to_string(),
            UserRole::Cashier,
        )
    }

    #[tokio::test]
    async fn initialize_seeds_exactly_three_demo_users() {
        let store = setup_store().await;

        let users = store.get_all().await.unwrap();
        assert_eq!(users.len(), 3);
        assert!(users.iter().all(|u| u.is_active));

        let mut roles: Vec<&str> = users.iter().map(|u| u.role.as_str()).collect();
        roles.sort_unstable();
        assert_eq!(roles, ["cashier", "manager", "super_admin"]);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let store = setup_store().await;
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn demo_admin_authenticates_with_seeded_credentials() {
        let store = setup_store().await;

        let user = store
            .authenticate("admin@techcorp.com", "password123")
            .await
            .unwrap()
            .expect("seeded admin should authenticate");
        assert_eq!(user.role, UserRole::SuperAdmin);
        assert!(user.last_login_at.is_some());

        // last_login_at is durable, not just set on the returned copy.
        let stored = store.get_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn authenticate_is_case_insensitive_on_email() {
        let store = setup_store().await;
        let user = store
            .authenticate("ADMIN@TechCorp.COM", "password123")
            .await
            .unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_secret_and_unknown_email() {
        let store = setup_store().await;
        assert!(store
            .authenticate("admin@techcorp.com", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .authenticate("ghost@techcorp.com", "password123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn authenticate_skips_deactivated_users() {
        let store = setup_store().await;
        store.set_active("demo-cashier", false).await.unwrap();

        assert!(store
            .authenticate("cashier@techcorp.com", "password123")
            .await
            .unwrap()
            .is_none());

        store.set_active("demo-cashier", true).await.unwrap();
        assert!(store
            .authenticate("cashier@techcorp.com", "password123")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn upsert_validates_required_fields() {
        let store = setup_store().await;
        let result = store.upsert(&new_user("", "No Id", "noid@techcorp.com")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id_remote_wins() {
        let store = setup_store().await;
        store
            .upsert(&new_user("usr-x", "A", "x@techcorp.com"))
            .await
            .unwrap();

        let mut replacement = new_user("usr-x", "B", "x@techcorp.com");
        replacement.role = UserRole::Manager;
        store.upsert(&replacement).await.unwrap();

        let stored = store.get_by_id("usr-x").await.unwrap().unwrap();
        assert_eq!(stored.name, "B");
        assert_eq!(stored.role, UserRole::Manager);
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn bulk_upsert_is_idempotent() {
        let store = setup_store().await;
        let batch = vec![new_user("usr-a", "User A", "a@techcorp.com")];

        store.bulk_upsert(&batch).await.unwrap();
        let first = store.get_all().await.unwrap();

        store.bulk_upsert(&batch).await.unwrap();
        let second = store.get_all().await.unwrap();

        assert_eq!(first.len(), second.len());
        let a1 = first.iter().find(|u| u.id == "usr-a").unwrap();
        let a2 = second.iter().find(|u| u.id == "usr-a").unwrap();
        assert_eq!(a1.name, a2.name);
        assert_eq!(a1.email, a2.email);
    }

    #[tokio::test]
    async fn bulk_upsert_counts_invalid_records_without_aborting() {
        let store = setup_store().await;

        let mut batch: Vec<User> = (0..5)
            .map(|i| new_user(&format!("usr-{i}"), &format!("User {i}"), &format!("u{i}@techcorp.com")))
            .collect();
        batch.push(new_user("", "Missing Id", "missing@techcorp.com"));

        let report = store.bulk_upsert(&batch).await.unwrap();
        assert_eq!(report.synced, 5);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);

        // 3 seeds + 5 new records; the invalid one never landed.
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|u| !u.id.is_empty()));
    }

    #[tokio::test]
    async fn bulk_upsert_counts_email_collisions_per_record() {
        let store = setup_store().await;

        // Same email as the seeded admin but a different id.
        let collision = new_user("usr-dupe", "Impostor", "admin@techcorp.com");
        let ok = new_user("usr-ok", "Fine", "fine@techcorp.com");

        let report = store.bulk_upsert(&[collision, ok]).await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 1);
        assert!(store.get_by_id("usr-ok").await.unwrap().is_some());
        assert!(store.get_by_id("usr-dupe").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_by_email_matches_any_case() {
        let store = setup_store().await;
        let user = store.get_by_email("Manager@TechCorp.com").await.unwrap();
        assert_eq!(user.unwrap().id, "demo-manager");
        assert!(store.get_by_email("nobody@techcorp.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_active_on_unknown_id_is_not_found() {
        let store = setup_store().await;
        let result = store.set_active("ghost", false).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
