use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{LoginHistoryEntry, NewLoginAttempt, NewUser, User, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store's uniqueness constraint on `email` rejected the write.
    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store. Emails passed in are already normalized.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a user. Must be atomic with respect to email uniqueness.
    async fn create(&self, user: NewUser) -> StoreResult<User>;
}

/// Append-only log of login attempts.
#[async_trait]
pub trait LoginHistoryRepository: Send + Sync {
    async fn create(&self, attempt: NewLoginAttempt) -> StoreResult<LoginHistoryEntry>;

    /// Newest first, at most `limit` entries.
    async fn find_by_user_id(&self, user_id: Uuid, limit: i64)
        -> StoreResult<Vec<LoginHistoryEntry>>;

    /// Newest first, at most `limit` entries.
    async fn find_by_email(&self, email: &str, limit: i64) -> StoreResult<Vec<LoginHistoryEntry>>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, full_name, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;

        Ok(row.map(User::try_from).transpose()?)
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, full_name, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, full_name, password_hash, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateEmail
            }
            other => StoreError::Backend(anyhow::Error::new(other).context("insert user")),
        })?;

        Ok(User::try_from(row)?)
    }
}

#[derive(Clone)]
pub struct PgLoginHistoryRepository {
    db: PgPool,
}

impl PgLoginHistoryRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LoginHistoryRepository for PgLoginHistoryRepository {
    async fn create(&self, attempt: NewLoginAttempt) -> StoreResult<LoginHistoryEntry> {
        let entry = sqlx::query_as::<_, LoginHistoryEntry>(
            r#"
            INSERT INTO login_history (id, user_id, email, success, ip_address, user_agent, attempted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, email, success, ip_address, user_agent, attempted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.user_id) // NULL when no account matched
        .bind(&attempt.email)
        .bind(attempt.success)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.attempted_at)
        .fetch_one(&self.db)
        .await
        .context("insert login attempt")?;
        Ok(entry)
    }

    async fn find_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<LoginHistoryEntry>> {
        let rows = sqlx::query_as::<_, LoginHistoryEntry>(
            r#"
            SELECT id, user_id, email, success, ip_address, user_agent, attempted_at
              FROM login_history
             WHERE user_id = $1
             ORDER BY attempted_at DESC, seq DESC
             LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list login history by user")?;
        Ok(rows)
    }

    async fn find_by_email(&self, email: &str, limit: i64) -> StoreResult<Vec<LoginHistoryEntry>> {
        let rows = sqlx::query_as::<_, LoginHistoryEntry>(
            r#"
            SELECT id, user_id, email, success, ip_address, user_agent, attempted_at
              FROM login_history
             WHERE email = $1
             ORDER BY attempted_at DESC, seq DESC
             LIMIT $2
            "#,
        )
        .bind(email)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list login history by email")?;
        Ok(rows)
    }
}
