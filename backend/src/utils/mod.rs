//! Collection of general utilities used by the authentication flow.
//!
//! Token signing, password hashing, e-mail domain checks, invite code
//! generation and request throttling each live in their own module.

pub mod domain;
pub mod invite_code;
pub mod jwt;
pub mod password;
pub mod rate_limit;
