//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::web::state::AppState;

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Middleware that validates the bearer access token.
///
/// If valid, inserts the `AuthUser` into request extensions for handlers to use.
/// If missing, malformed, expired or refresh-typed, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    // 2. Validate it
    let claims = state.jwt.validate_access_token(token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::from(e)
    })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(AuthUser::from(claims));

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
