//! Global application error types.
//!
//! This module defines the error taxonomy shared by the authentication
//! service and the HTTP layer. Every failure of a service operation is a
//! `ServiceError`; the API layer turns it into a JSON response with an
//! explicit status code.

use crate::repositories::RepositoryError;
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Errors surfaced by the authentication operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldViolation>,
    },

    #[error("Invalid email domain.")]
    InvalidDomain { domain: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Could not create token: {message}")]
    TokenCreationFailed { message: String },

    #[error("Token is invalid: {message}")]
    InvalidToken { message: String },

    #[error("User not found: {identifier}")]
    UserNotFound { identifier: String },

    #[error("Registration failed: {message}")]
    RegistrationFailed { message: String },

    #[error("Failed to logout: {message}")]
    LogoutFailed { message: String },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Validation failure pinned to a single request field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Validation {
            message: message.clone(),
            fields: vec![FieldViolation {
                field: field.into(),
                message,
            }],
        }
    }

    pub fn invalid_domain(domain: impl Into<String>) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
        }
    }

    pub fn token_creation_failed(message: impl Into<String>) -> Self {
        Self::TokenCreationFailed {
            message: message.into(),
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    pub fn user_not_found(identifier: impl Into<String>) -> Self {
        Self::UserNotFound {
            identifier: identifier.into(),
        }
    }

    pub fn registration_failed(message: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            message: message.into(),
        }
    }

    pub fn logout_failed(message: impl Into<String>) -> Self {
        Self::LogoutFailed {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Formats `validator` output into a `Validation` error.
    ///
    /// Fields are sorted so the combined message is stable.
    pub fn from_validation_errors(errors: &validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldViolation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldViolation {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_deref()
                        .unwrap_or("Invalid value")
                        .to_string(),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        let message = fields
            .iter()
            .map(|violation| format!("{}: {}", violation.field, violation.message))
            .collect::<Vec<_>>()
            .join(", ");

        Self::Validation { message, fields }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => {
                Self::field("email", "The email has already been taken.")
            }
            other => Self::Database {
                source: anyhow::Error::new(other),
            },
        }
    }
}
