//! JWT token utilities for authentication.
//!
//! Provides token creation, validation and revocation. The [`TokenIssuer`]
//! trait is what the authentication service depends on; [`JwtTokenIssuer`]
//! implements it with HS256 tokens and a persisted revocation list.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::repositories::revoked_token_repository::RevokedTokenRepository;

/// JWT errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Revocation store error: {0}")]
    Store(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Token issued at timestamp
    pub iat: i64,
    /// Not valid before timestamp
    pub nbf: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Unique token id, used for revocation
    pub jti: String,
    /// Issuer
    pub iss: String,
}

/// JWT token utility for creating and validating tokens
#[derive(Clone)]
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in_seconds: i64,
    issuer: String,
}

impl JwtUtils {
    pub fn new(secret: &str, expires_in_seconds: u64, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        JwtUtils {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expires_in_seconds: i64::try_from(expires_in_seconds).unwrap_or(i64::MAX),
            issuer,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_expires_in_seconds,
            config.jwt_issuer.clone(),
        )
    }

    /// Build the claims for a fresh token bound to `user_id`.
    pub fn claims_for(&self, user_id: &str) -> Claims {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(Duration::seconds(self.expires_in_seconds))
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);

        Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
        }
    }

    /// Sign a set of claims.
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Generate a new JWT token for a user
    pub fn generate_token(&self, user_id: &str) -> Result<String, JwtError> {
        self.encode_claims(&self.claims_for(user_id))
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(JwtError::from)
    }
}

/// Token capability used by the authentication service.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issue a signed token bound to `user_id`.
    async fn issue(&self, user_id: &str) -> Result<String, JwtError>;

    /// Check signature, expiry and revocation; returns the bound user id.
    async fn verify(&self, token: &str) -> Result<String, JwtError>;

    /// Revoke a still-valid token so it can no longer authenticate.
    async fn invalidate(&self, token: &str) -> Result<(), JwtError>;
}

/// HS256 token issuer backed by the `revoked_tokens` table.
#[derive(Clone)]
pub struct JwtTokenIssuer {
    jwt: JwtUtils,
    revoked: RevokedTokenRepository,
}

impl JwtTokenIssuer {
    pub fn new(jwt: JwtUtils, revoked: RevokedTokenRepository) -> Self {
        Self { jwt, revoked }
    }

    async fn valid_claims(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.jwt.validate_token(token)?;
        let revoked = self
            .revoked
            .is_revoked(&claims.jti)
            .await
            .map_err(|e| JwtError::Store(e.to_string()))?;
        if revoked {
            return Err(JwtError::Revoked);
        }
        Ok(claims)
    }
}

#[async_trait]
impl TokenIssuer for JwtTokenIssuer {
    async fn issue(&self, user_id: &str) -> Result<String, JwtError> {
        self.jwt.generate_token(user_id)
    }

    async fn verify(&self, token: &str) -> Result<String, JwtError> {
        self.valid_claims(token).await.map(|claims| claims.sub)
    }

    async fn invalidate(&self, token: &str) -> Result<(), JwtError> {
        let claims = self.valid_claims(token).await?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(JwtError::InvalidToken)?;

        self.revoked
            .revoke(&claims.jti, expires_at)
            .await
            .map_err(|e| JwtError::Store(e.to_string()))?;

        match self.revoked.purge_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "purged expired token revocations"),
            Err(e) => tracing::warn!(error = %e, "failed to purge expired token revocations"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    const SECRET: &str = "test-secret";

    async fn issuer() -> JwtTokenIssuer {
        let pool = database::in_memory().await.unwrap();
        JwtTokenIssuer::new(
            JwtUtils::new(SECRET, 3600, "authapi"),
            RevokedTokenRepository::new(pool),
        )
    }

    #[tokio::test]
    async fn test_issue_and_verify_round_trip() {
        let issuer = issuer().await;
        let token = issuer.issue("user-1").await.unwrap();
        assert_eq!(issuer.verify(&token).await.unwrap(), "user-1");
    }

    #[tokio::test]
    async fn test_tokens_have_distinct_ids() {
        let jwt = JwtUtils::new(SECRET, 3600, "authapi");
        let a = jwt.validate_token(&jwt.generate_token("u").unwrap()).unwrap();
        let b = jwt.validate_token(&jwt.generate_token("u").unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_eq!(a.exp - a.iat, 3600);
    }

    #[tokio::test]
    async fn test_invalidated_token_is_rejected() {
        let issuer = issuer().await;
        let token = issuer.issue("user-1").await.unwrap();
        let other = issuer.issue("user-1").await.unwrap();

        issuer.invalidate(&token).await.unwrap();

        assert!(matches!(issuer.verify(&token).await, Err(JwtError::Revoked)));
        assert!(matches!(issuer.invalidate(&token).await, Err(JwtError::Revoked)));
        assert_eq!(issuer.verify(&other).await.unwrap(), "user-1");
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let issuer = issuer().await;
        let jwt = JwtUtils::new(SECRET, 3600, "authapi");
        let mut claims = jwt.claims_for("user-1");
        claims.iat -= 7200;
        claims.nbf -= 7200;
        claims.exp = Utc::now().timestamp() - 10;
        let token = jwt.encode_claims(&claims).unwrap();

        assert!(matches!(issuer.verify(&token).await, Err(JwtError::Expired)));
    }

    #[tokio::test]
    async fn test_foreign_signature_is_rejected() {
        let issuer = issuer().await;
        let forged = JwtUtils::new("another-secret", 3600, "authapi")
            .generate_token("user-1")
            .unwrap();

        assert!(matches!(
            issuer.verify(&forged).await,
            Err(JwtError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_wrong_issuer_is_rejected() {
        let issuer = issuer().await;
        let token = JwtUtils::new(SECRET, 3600, "someone-else")
            .generate_token("user-1")
            .unwrap();

        assert!(issuer.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        let issuer = issuer().await;
        assert!(issuer.verify("not-a-jwt").await.is_err());
        assert!(issuer.invalidate("not-a-jwt").await.is_err());
    }
}
