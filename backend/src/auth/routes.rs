//! Defines the HTTP routes specifically for authentication.
//!
//! Registration and login are public; the current-user and logout routes sit
//! behind the bearer token gate. The router is nested under `/v1/auth`.

use crate::auth::handlers::*;
use crate::auth::middleware::*;
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/user", get(current_user).layer(middleware::from_fn(jwt_auth)))
        .route("/logout", post(logout).layer(middleware::from_fn(jwt_auth)))
}
