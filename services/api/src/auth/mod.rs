//! services/api/src/auth/mod.rs
//!
//! Credentials and tokens: argon2 password hashing, HS256 access tokens, opaque
//! refresh tokens, and Azure AD ID-token validation.

pub mod azure;
pub mod jwt;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use genfuze_core::ports::PortError;

pub use azure::{AzureIdentity, AzureVerifier};
pub use jwt::{Claims, JwtService, TokenType};

pub const REFRESH_TOKEN_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Azure AD validation failed: {0}")]
    Azure(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(d) => ApiError::Unauthorized(d),
            AuthError::Azure(d) => ApiError::Port(PortError::Upstream(d)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// The caller of a protected route, placed in request extensions by `require_auth`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// `false` for a wrong password and for a hash that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// A random 64-character alphanumeric refresh token.
pub fn generate_refresh_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect()
}
