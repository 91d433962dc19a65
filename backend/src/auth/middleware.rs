//! Middleware for protecting authenticated routes and throttling requests.
//!
//! `jwt_auth` validates the bearer token and exposes it to handlers;
//! `rate_limit` applies the fixed-window limit to every request it wraps.

use crate::api::common::{ApiError, ErrorBody, api_error, service_error_to_http};
use crate::auth::service::AuthService;
use crate::errors::ServiceError;
use crate::utils::rate_limit::{FixedWindowRateLimiter, RateLimitDecision};
use axum::{
    Json,
    extract::{ConnectInfo, Request},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{AUTHORIZATION, RETRY_AFTER},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// The verified bearer token of the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedToken {
    pub token: String,
    pub user_id: String,
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn unauthenticated() -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "Unauthenticated.", "unauthenticated")
}

/// JWT authentication middleware
pub async fn jwt_auth(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        return Err(unauthenticated());
    };

    let service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| {
            service_error_to_http(ServiceError::internal_error(
                "AuthService extension missing",
            ))
        })?;

    match service.authenticate(&token).await {
        Ok(user_id) => {
            request
                .extensions_mut()
                .insert(AuthenticatedToken { token, user_id });
            Ok(next.run(request).await)
        }
        Err(e @ ServiceError::InternalError { .. }) => Err(service_error_to_http(e)),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            Err(unauthenticated())
        }
    }
}

/// Identifies the caller for throttling: peer address, then the first
/// `X-Forwarded-For` hop, then a shared bucket.
fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| "unknown".to_string(), str::to_string)
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
}

/// Fixed-window rate limiting middleware
pub async fn rate_limit(request: Request, next: Next) -> Response {
    let Some(limiter) = request
        .extensions()
        .get::<Arc<FixedWindowRateLimiter>>()
        .cloned()
    else {
        return next.run(request).await;
    };

    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let key = client_key(&request);
    let decision = limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");

        let body = ErrorBody::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too Many Attempts.",
            "rate_limited",
        );
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);
        // Round up so clients never retry inside the current window.
        let retry_after = decision.retry_after.as_secs()
            + u64::from(decision.retry_after.subsec_nanos() > 0);
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}
