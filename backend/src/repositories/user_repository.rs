//! Database repository for user records.
//!
//! Provides the insert and lookup queries behind registration and login.

use crate::database::models::{CreateUser, User};
use crate::repositories::{RepositoryError, RepositoryResult, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

const USER_COLUMNS: &str =
    "id, name, email, password, invite_link, ref_by, created_at, updated_at";

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    /// Shared SQLite connection pool
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository instance.
    ///
    /// # Arguments
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Retrieves a single user matching `column = value`.
    async fn find_one(&self, column: &str, value: &str) -> RepositoryResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Total number of stored users.
    #[cfg(test)]
    pub async fn count(&self) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Maps unique-constraint violations onto the matching repository error.
fn classify_insert_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            if message.contains("users.email") {
                return RepositoryError::DuplicateEmail;
            }
            if message.contains("users.invite_link") {
                return RepositoryError::DuplicateInviteLink;
            }
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl UserStore for UserRepository {
    /// Creates a new user in the database.
    ///
    /// The referrer lookup and the insert share one transaction. Returning
    /// early drops `tx` without committing, which rolls it back.
    async fn create_user(
        &self,
        user: CreateUser,
        referral_code: Option<&str>,
    ) -> RepositoryResult<User> {
        let mut tx = self.pool.begin().await?;

        let ref_by = match referral_code {
            Some(code) => {
                sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE invite_link = ?")
                    .bind(code)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, invite_link, ref_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.invite_link)
        .bind(&ref_by)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(classify_insert_error)?;

        tx.commit().await?;

        Ok(User {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            invite_link: user.invite_link,
            ref_by,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        self.find_one("id", id).await
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_invite_link(&self, invite_link: &str) -> RepositoryResult<Option<User>> {
        self.find_one("invite_link", invite_link).await
    }
}
