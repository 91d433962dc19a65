//! Data structures for authentication requests and responses.
//!
//! Request bodies default missing fields to empty values so that absent
//! input is reported by validation rather than by the JSON extractor.

use crate::database::models::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Registration request payload
#[derive(Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "The name field is required."))]
    pub name: String,

    #[serde(default)]
    #[validate(
        email(message = "The email must be a valid email address."),
        length(max = 255, message = "The email must not be greater than 255 characters.")
    )]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 6, message = "The password must be at least 6 characters."))]
    pub password: String,

    #[serde(default)]
    pub referral_code: Option<String>,
}

impl RegisterRequest {
    /// Trims textual input, lowercases the email and drops a blank
    /// referral code.
    ///
    /// Passwords are left untouched.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            password: self.password,
            referral_code: self
                .referral_code
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty()),
        }
    }
}

/// Login request payload
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

/// A freshly registered user with its first token.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub token: String,
}

/// Registration response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status_code: u16,
    pub message: String,
    pub token: String,
    pub user: User,
}

/// Login response carrying the issued bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Current user response
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

/// Plain confirmation message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
