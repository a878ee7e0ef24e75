use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::user::User,
};

/// The persistent credential-store contract consumed by the security core.
///
/// Storage-engine agnostic so the guards can be tested against an in-memory
/// backend with a fake clock.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by their login name.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Finds a user by their ID.
    async fn find_by_id(&self, user_id: &Uuid) -> Result<Option<User>>;

    /// Overwrites the consecutive-failure counter.
    async fn update_failed_attempts(&self, user_id: &Uuid, attempts: i32) -> Result<()>;

    /// Locks the account as of `locked_at`.
    async fn lock_account(&self, user_id: &Uuid, locked_at: DateTime<Utc>) -> Result<()>;

    /// Replaces the stored hash with a modern one and clears the legacy salt.
    async fn update_password_hash(&self, user_id: &Uuid, hash: &str) -> Result<()>;
}

/// `UserStore` backed by PostgreSQL through deadpool.
pub struct PostgresUserStore {
    pool: Pool,
}

impl PostgresUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        username: row.try_get("username").map_err(|_| AppError::MissingData("username".to_string()))?,
        name: row.try_get("name").map_err(|_| AppError::MissingData("name".to_string()))?,
        role: row.try_get("role").map_err(|_| AppError::MissingData("role".to_string()))?,
        password_hash: row.try_get("password_hash").map_err(|_| AppError::MissingData("password_hash".to_string()))?,
        password_salt: row.try_get("password_salt").map_err(|_| AppError::MissingData("password_salt".to_string()))?,
        failed_attempts: row.try_get("failed_attempts").map_err(|_| AppError::MissingData("failed_attempts".to_string()))?,
        locked_at: row.try_get("locked_at").map_err(|_| AppError::MissingData("locked_at".to_string()))?,
        is_active: row.try_get("is_active").map_err(|_| AppError::MissingData("is_active".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, username, name, role, password_hash, password_salt,
                       failed_attempts, locked_at, is_active, created_at
                FROM users
                WHERE username = $1
                "#,
                &[&username],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, username, name, role, password_hash, password_salt,
                       failed_attempts, locked_at, is_active, created_at
                FROM users
                WHERE id = $1
                "#,
                &[user_id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn update_failed_attempts(&self, user_id: &Uuid, attempts: i32) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE users
                SET failed_attempts = $1
                WHERE id = $2
                "#,
                &[&attempts, user_id],
            )
            .await?;
        Ok(())
    }

    async fn lock_account(&self, user_id: &Uuid, locked_at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE users
                SET locked_at = $1
                WHERE id = $2
                "#,
                &[&locked_at, user_id],
            )
            .await?;
        Ok(())
    }

    async fn update_password_hash(&self, user_id: &Uuid, hash: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE users
                SET password_hash = $1, password_salt = NULL
                WHERE id = $2
                "#,
                &[&hash, user_id],
            )
            .await?;
        Ok(())
    }
}
