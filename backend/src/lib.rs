//! User authentication API.
//!
//! Exposes registration with referral attribution, login, current-user lookup
//! and logout over a versioned JSON API backed by SQLite.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod repositories;
pub mod utils;

use crate::auth::AuthService;
use crate::utils::rate_limit::FixedWindowRateLimiter;
use axum::{Extension, Json, Router, middleware, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

/// Builds the full application router.
///
/// Every `/v1` route is throttled by `limiter`; the service info route at `/`
/// is not.
pub fn app(service: Arc<AuthService>, limiter: Arc<FixedWindowRateLimiter>) -> Router {
    let v1 = Router::new()
        .nest("/auth", auth::routes::auth_router())
        .layer(middleware::from_fn(auth::middleware::rate_limit));

    Router::new()
        .route("/", get(root_handler))
        .nest("/v1", v1)
        .layer(Extension(service))
        .layer(Extension(limiter))
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
