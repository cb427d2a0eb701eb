//! services/api/src/auth/jwt.rs
//!
//! Issues and validates the service's own HS256 access tokens.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::AuthError;
use genfuze_core::domain::User;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    /// Issued at, seconds since the epoch
    pub iat: u64,
    /// Expiration, seconds since the epoch
    pub exp: u64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_expiry: u64,
}

impl JwtService {
    pub fn new(secret: &str, access_token_expiry: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_token_expiry,
        }
    }

    /// Lifetime of issued access tokens, in seconds.
    pub fn access_token_expiry(&self) -> u64 {
        self.access_token_expiry
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        let now = now_secs();
        self.sign(&Claims {
            sub: user.id,
            email: user.email.clone(),
            roles: user.roles.clone(),
            iat: now,
            exp: now + self.access_token_expiry,
            token_type: TokenType::Access,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validates signature and expiry, and rejects anything that is not an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken("not an access token".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a-test-secret-that-is-long-enough";

    fn user() -> User {
        User::new("jwt@example.com", None, None)
    }

    fn claims(user: &User, exp_offset: i64, token_type: TokenType) -> Claims {
        let now = now_secs();
        Claims {
            sub: user.id,
            email: user.email.clone(),
            roles: user.roles.clone(),
            iat: now,
            exp: (now as i64 + exp_offset) as u64,
            token_type,
        }
    }

    #[test]
    fn fresh_access_token_round_trips() {
        let jwt = JwtService::new(SECRET, 900);
        let user = user();
        let token = jwt.issue_access_token(&user).unwrap();
        let claims = jwt.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "jwt@example.com");
        assert_eq!(claims.roles, vec!["user".to_string()]);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtService::new(SECRET, 900);
        let token = jwt.sign(&claims(&user(), -120, TokenType::Access)).unwrap();
        assert!(matches!(jwt.validate_access_token(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn refresh_typed_token_is_rejected() {
        let jwt = JwtService::new(SECRET, 900);
        let token = jwt.sign(&claims(&user(), 600, TokenType::Refresh)).unwrap();
        assert!(jwt.validate_access_token(&token).is_err());
    }

    #[test]
    fn wrong_secret_and_tampering_are_rejected() {
        let issuer = JwtService::new(SECRET, 900);
        let other = JwtService::new("another-secret-of-enough-length", 900);
        let token = issuer.issue_access_token(&user()).unwrap();
        assert!(other.validate_access_token(&token).is_err());

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = issuer.sign(&claims(&User::new("evil@example.com", None, None), 600, TokenType::Access)).unwrap();
        parts[1] = forged.split('.').nth(1).unwrap().to_string();
        assert!(issuer.validate_access_token(&parts.join(".")).is_err());
    }
}
