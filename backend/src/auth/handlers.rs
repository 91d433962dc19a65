//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for registration, login,
//! current-user lookup and logout, parse request data, and delegate to
//! `auth::service` for the business logic.

use crate::api::common::{ApiError, json_rejection_to_http, service_error_to_http};
use crate::auth::middleware::AuthenticatedToken;
use crate::auth::models::*;
use crate::auth::service::AuthService;
use axum::{
    extract::{Extension, Json, rejection::JsonRejection},
    http::StatusCode,
    response::Json as ResponseJson,
};
use std::sync::Arc;

/// Handle user registration request
#[axum::debug_handler]
pub async fn register(
    Extension(service): Extension<Arc<AuthService>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, ResponseJson<RegisterResponse>), ApiError> {
    let Json(payload) = payload.map_err(json_rejection_to_http)?;

    match service.register(payload).await {
        Ok(Registration { user, token }) => Ok((
            StatusCode::CREATED,
            ResponseJson(RegisterResponse {
                status_code: StatusCode::CREATED.as_u16(),
                message: "User registered successfully.".to_string(),
                token,
                user,
            }),
        )),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    Extension(service): Extension<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ResponseJson<LoginResponse>, ApiError> {
    let Json(payload) = payload.map_err(json_rejection_to_http)?;

    match service.login(payload).await {
        Ok(token) => Ok(ResponseJson(LoginResponse { token })),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Get current user information from token
#[axum::debug_handler]
pub async fn current_user(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(auth): Extension<AuthenticatedToken>,
) -> Result<ResponseJson<UserResponse>, ApiError> {
    tracing::debug!(user_id = %auth.user_id, "Fetching current user");
    match service.current_user(&auth.token).await {
        Ok(user) => Ok(ResponseJson(UserResponse { user })),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle logout request by revoking the presented token
#[axum::debug_handler]
pub async fn logout(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(auth): Extension<AuthenticatedToken>,
) -> Result<ResponseJson<MessageResponse>, ApiError> {
    match service.logout(&auth.token).await {
        Ok(()) => Ok(ResponseJson(MessageResponse {
            message: "User successfully logged out".to_string(),
        })),
        Err(error) => Err(service_error_to_http(error)),
    }
}
