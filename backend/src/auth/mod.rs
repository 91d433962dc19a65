//! Authentication module for user accounts and bearer tokens.
//!
//! This module provides the public interface for registration, login,
//! current-user lookup and logout, along with the token gate and throttling
//! middleware that guard the routes.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;

pub use service::AuthService;
