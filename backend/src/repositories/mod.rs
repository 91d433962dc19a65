//! Persistence layer.
//!
//! Repositories own a clone of the SQLite pool and expose the narrow set of
//! queries the authentication flow needs. The user store is reached through
//! the [`UserStore`] trait so the service can be exercised against an
//! in-memory implementation.

use crate::database::models::{CreateUser, User};
use async_trait::async_trait;
use thiserror::Error;

pub mod revoked_token_repository;
pub mod user_repository;

/// Errors raised by repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("invite link already in use")]
    DuplicateInviteLink,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Storage capability for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user, linking it to the owner of `referral_code` if one exists.
    ///
    /// The referral lookup and the insert happen atomically: on any error
    /// nothing is persisted.
    async fn create_user(
        &self,
        user: CreateUser,
        referral_code: Option<&str>,
    ) -> RepositoryResult<User>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Looks up the owner of an invite link.
    ///
    /// Registration resolves referrals inside `create_user`, so this is not
    /// on the request path.
    async fn find_by_invite_link(&self, invite_link: &str) -> RepositoryResult<Option<User>>;
}
