//! Password hashing.
//!
//! The authentication service hashes and verifies through the
//! [`PasswordHasher`] trait; [`BcryptPasswordHasher`] is the production
//! implementation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Password verification failed: {0}")]
    Verify(String),
}

/// One-way, salted password hashing.
///
/// Implementations are synchronous and may be CPU heavy; async callers should
/// run them on a blocking thread.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Returns `Ok(false)` for a wrong password and `Err` when `hash` is not
    /// a hash this implementation understands.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}

pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        bcrypt::hash(password, self.cost).map_err(|e| PasswordError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        bcrypt::verify(password, hash).map_err(|e| PasswordError::Verify(e.to_string()))
    }
}
