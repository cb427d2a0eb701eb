//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: registration, password and Azure AD login, refresh
//! token rotation, logout, and the current-user lookup.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{generate_refresh_token, hash_password, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;
use genfuze_core::domain::{User, UserSession};
use genfuze_core::ports::PortError;

pub const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AzureLoginRequest {
    pub id_token: String,
}

/// A user as returned to clients; never carries the password hash.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            roles: user.roles,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// A deliberately loose shape check: one `@`, a non-empty local part and a dotted domain.
fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Signs an access token and stores a fresh refresh-token record for `user`.
async fn issue_tokens(state: &AppState, user: User) -> ApiResult<TokenResponse> {
    let access_token = state.jwt.issue_access_token(&user)?;
    let refresh_token = generate_refresh_token();
    let now = Utc::now();
    state
        .db
        .create_user_session(UserSession {
            id: Uuid::new_v4(),
            user_id: user.id,
            token: refresh_token.clone(),
            expires_at: now + Duration::seconds(state.config.refresh_token_expiry_secs as i64),
            created_at: now,
        })
        .await?;

    Ok(TokenResponse {
        user: user.into(),
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry(),
    })
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("invalid email or password".to_string())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/register - Create a new account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 400, description = "Invalid email or password too short"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(&req.password)?;
    let name = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let user = state
        .db
        .create_user(User::new(&email, Some(password_hash), name))
        .await?;
    info!("Registered user {}", user.id);

    let body = issue_tokens(&state, user).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /api/auth/login - Login with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    // 1. Get user by email; an unknown email looks like a wrong password
    let mut user = match state.db.get_user_by_email(&req.email).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => return Err(invalid_credentials()),
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password; Azure-only accounts have none
    let valid = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(&req.password, hash));
    if !valid {
        return Err(invalid_credentials());
    }

    // 3. Record the login and issue tokens
    let now = Utc::now();
    state.db.touch_last_login(user.id, now).await?;
    user.last_login_at = Some(now);

    Ok(Json(issue_tokens(&state, user).await?))
}

/// POST /api/auth/refresh - Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenResponse),
        (status = 401, description = "Unknown or expired refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let record = match state.db.get_user_session(&req.refresh_token).await {
        Ok(record) => record,
        Err(PortError::NotFound(_)) => {
            return Err(ApiError::Unauthorized("unknown refresh token".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    // Rotation: the presented token is spent whether or not it was still valid.
    state.db.delete_user_session(&record.token).await?;
    if record.is_expired(Utc::now()) {
        return Err(ApiError::Unauthorized("refresh token expired".to_string()));
    }

    let user = match state.db.get_user_by_id(record.user_id).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            return Err(ApiError::Unauthorized("account no longer exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(issue_tokens(&state, user).await?))
}

/// POST /api/auth/logout - Revoke a refresh token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Logged out")
    ),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<StatusCode> {
    state.db.delete_user_session(&req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/azure - Sign in with an Azure AD ID token
#[utoipa::path(
    post,
    path = "/api/auth/azure",
    request_body = AzureLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Token rejected"),
        (status = 502, description = "Signing keys could not be fetched"),
        (status = 503, description = "Azure AD is not configured")
    ),
    tag = "auth"
)]
pub async fn azure_login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AzureLoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let verifier = state
        .azure
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Azure AD sign-in is not configured".to_string()))?;
    let identity = verifier.verify(&req.id_token).await?;

    let mut user = match state.db.get_user_by_email(&identity.email).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            info!("Creating account for first Azure sign-in");
            state
                .db
                .create_user(User::new(&identity.email, None, identity.name))
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    let now = Utc::now();
    if let Err(e) = state.db.touch_last_login(user.id, now).await {
        warn!("Failed to record Azure login for {}: {}", user.id, e);
    } else {
        user.last_login_at = Some(now);
    }

    Ok(Json(issue_tokens(&state, user).await?))
}

/// GET /api/auth/me - The authenticated user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserView),
        (status = 401, description = "Missing or invalid access token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<UserView>> {
    let user = state.db.get_user_by_id(auth.id).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@.com"));
    }
}
