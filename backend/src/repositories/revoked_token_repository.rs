//! Database repository for revoked token identifiers.
//!
//! Logged-out tokens are remembered by their `jti` until their own expiry,
//! after which the signature check rejects them anyway and the row can go.

use crate::database::models::RevokedToken;
use crate::repositories::RepositoryResult;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct RevokedTokenRepository {
    pool: SqlitePool,
}

impl RevokedTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records a token id as revoked. Revoking twice is a no-op.
    pub async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> RepositoryResult<()> {
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
            .bind(jti)
            .bind(expires_at.timestamp())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn is_revoked(&self, jti: &str) -> RepositoryResult<bool> {
        let found = self.find(jti).await?;
        Ok(found.is_some())
    }

    pub async fn find(&self, jti: &str) -> RepositoryResult<Option<RevokedToken>> {
        let token = sqlx::query_as::<_, RevokedToken>(
            "SELECT jti, expires_at FROM revoked_tokens WHERE jti = ?",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Deletes revocation entries whose tokens have expired.
    ///
    /// # Returns
    /// Number of rows removed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
