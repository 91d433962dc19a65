//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. Note that these may differ from API-specific models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered user.
///
/// The password hash is stored in the `password` column and is never
/// serialized into API responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    #[sqlx(rename = "password")]
    pub password_hash: String,
    /// Referral code other users can register with.
    pub invite_link: String,
    /// Id of the user whose invite link was used at registration.
    pub ref_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row data for a user about to be inserted.
///
/// `ref_by` is not part of this struct: it is resolved from the referral code
/// inside the insert transaction.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub invite_link: String,
}

/// A revoked token identifier, kept until the token would have expired anyway.
#[derive(Debug, Clone, FromRow)]
pub struct RevokedToken {
    pub jti: String,
    /// Unix timestamp of the token's own expiry.
    pub expires_at: i64,
}
