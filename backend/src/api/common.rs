//! Error handling utilities for API responses.
//!
//! Provides the structured error body shared by every endpoint and the
//! conversion from service-layer errors to HTTP responses.
//!
//! # Response Format
//! All errors return consistent JSON responses containing:
//! - `status_code`: HTTP status repeated in the body
//! - `message`: Human-readable message
//! - `error_type`: Machine-readable error category
//! - `error`: Raw underlying cause (registration failures only)
//! - `details`: Optional field-specific validation errors
//!
//! # Error Handling Flow
//! 1. Service layer returns a `ServiceError`
//! 2. `service_error_to_http` converts it to the matching status and body
//! 3. Validation errors carry per-field details

use crate::errors::ServiceError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Error payload returned by every endpoint on failure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Field-specific validation error details
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the field with validation error
    pub field: String,
    /// Description of the validation failure
    pub message: String,
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorBody>);

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            error_type: error_type.into(),
            error: None,
            details: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches field details; an empty list leaves `details` unset.
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }
}

/// Builds an error response with the given status.
pub fn api_error(status: StatusCode, message: impl Into<String>, error_type: &str) -> ApiError {
    (status, Json(ErrorBody::new(status, message, error_type)))
}

/// Converts ServiceError to appropriate HTTP response with standard format
pub fn service_error_to_http(error: ServiceError) -> ApiError {
    let body = match error {
        ServiceError::Validation { message, fields } => {
            let details = fields
                .into_iter()
                .map(|violation| FieldError {
                    field: violation.field,
                    message: violation.message,
                })
                .collect();
            ErrorBody::new(StatusCode::BAD_REQUEST, message, "validation_error")
                .with_details(details)
        }
        ServiceError::InvalidDomain { .. } => ErrorBody::new(
            StatusCode::BAD_REQUEST,
            "Invalid email domain.",
            "invalid_domain",
        ),
        ServiceError::InvalidCredentials => ErrorBody::new(
            StatusCode::BAD_REQUEST,
            "Invalid credentials",
            "invalid_credentials",
        ),
        ServiceError::TokenCreationFailed { .. } => ErrorBody::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not create token",
            "token_creation_failed",
        ),
        ServiceError::InvalidToken { .. } => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "Token is invalid", "invalid_token")
        }
        ServiceError::UserNotFound { .. } => {
            ErrorBody::new(StatusCode::NOT_FOUND, "User not found", "user_not_found")
        }
        ServiceError::RegistrationFailed { message } => ErrorBody::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Registration failed.",
            "registration_failed",
        )
        .with_error(message),
        ServiceError::LogoutFailed { .. } => ErrorBody::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to logout, please try again",
            "logout_failed",
        ),
        ServiceError::Database { source } => {
            tracing::error!("Database error: {}", source);
            ErrorBody::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "internal_error",
            )
        }
        ServiceError::InternalError { message } => {
            tracing::error!("Internal error: {}", message);
            ErrorBody::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "internal_error",
            )
        }
    };

    let status =
        StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body))
}

/// Maps a rejected JSON body onto a validation error response
pub fn json_rejection_to_http(rejection: JsonRejection) -> ApiError {
    service_error_to_http(ServiceError::validation(rejection.body_text()))
}
