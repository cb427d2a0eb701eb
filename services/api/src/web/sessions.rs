//! services/api/src/web/sessions.rs
//!
//! Saved-session CRUD and per-session competitor benchmarking. Every lookup is
//! scoped to the caller; another user's session is reported as not found.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;
use genfuze_core::domain::{QAData, Session, SessionType};
use genfuze_core::stats::{benchmark, compute_statistics, BenchmarkEntry};

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// The body of a save call. Any `statistics` the client sends are ignored and
/// recomputed from `qa_data`.
#[derive(Deserialize, ToSchema)]
pub struct SaveSessionRequest {
    pub session_type: SessionType,
    #[serde(default)]
    pub name: Option<String>,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub blog_content: Option<String>,
    pub qa_data: Vec<QAData>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    /// `question` or `answer`; all sessions when absent.
    #[serde(rename = "type")]
    pub session_type: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BenchmarkQuery {
    /// Comma-separated competitor names.
    #[serde(default)]
    pub competitors: Option<String>,
    pub brand: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BenchmarkResponse {
    pub session_id: Uuid,
    pub answers_analyzed: usize,
    pub entries: Vec<BenchmarkEntry>,
}

/// Splits a comma-separated query value, dropping blanks.
pub(crate) fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/sessions - Save a batch of QA data
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = SaveSessionRequest,
    responses(
        (status = 201, description = "Session saved", body = Session),
        (status = 400, description = "Invalid session payload"),
        (status = 401, description = "Missing or invalid access token")
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn save_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SaveSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.qa_data.iter().any(|qa| qa.question.trim().is_empty()) {
        return Err(ApiError::BadRequest("every QA entry needs a question".to_string()));
    }
    if let Some(bad) = req
        .qa_data
        .iter()
        .filter_map(|qa| qa.accuracy)
        .find(|a| !(0.0..=100.0).contains(a))
    {
        return Err(ApiError::BadRequest(format!("accuracy {} is outside 0-100", bad)));
    }

    let created_at = Utc::now();
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            format!(
                "{} session {}",
                req.session_type.as_str(),
                created_at.format("%Y-%m-%d %H:%M")
            )
        });

    let session = Session {
        id: Uuid::new_v4(),
        user_id: auth.id,
        session_type: req.session_type,
        name,
        provider: req.provider,
        model: req.model,
        source_urls: req.source_urls,
        blog_content: req.blog_content,
        statistics: compute_statistics(&req.qa_data),
        qa_data: req.qa_data,
        created_at,
    };

    let saved = state.db.save_session(session).await?;
    info!(
        "Saved {} session {} with {} QA pairs",
        saved.session_type.as_str(),
        saved.id,
        saved.qa_data.len()
    );
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/sessions - List the caller's sessions, newest first
#[utoipa::path(
    get,
    path = "/api/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Sessions", body = Vec<Session>),
        (status = 400, description = "Unknown session type")
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<Session>>> {
    let session_type = query
        .session_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(str::parse::<SessionType>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    Ok(Json(state.db.list_sessions(auth.id, session_type).await?))
}

/// GET /api/sessions/{id} - Fetch one session
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session", body = Session),
        (status = 404, description = "No such session for this user")
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.db.get_session(id, auth.id).await?))
}

/// DELETE /api/sessions/{id} - Delete one session
#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such session for this user")
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.db.delete_session(id, auth.id).await? {
        info!("Deleted session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {}", id)))
    }
}

/// GET /api/sessions/{id}/benchmark - Brand vs competitor mentions across a session's answers
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/benchmark",
    params(("id" = Uuid, Path, description = "Session id"), BenchmarkQuery),
    responses(
        (status = 200, description = "Mention statistics", body = BenchmarkResponse),
        (status = 400, description = "Neither a brand nor competitors were given"),
        (status = 404, description = "No such session for this user")
    ),
    security(("bearer" = [])),
    tag = "sessions"
)]
pub async fn benchmark_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<BenchmarkQuery>,
) -> ApiResult<Json<BenchmarkResponse>> {
    let competitors = split_list(query.competitors.as_deref());
    let brand = query.brand.as_deref().map(str::trim).filter(|b| !b.is_empty());
    if brand.is_none() && competitors.is_empty() {
        return Err(ApiError::BadRequest(
            "give a brand, competitors, or both".to_string(),
        ));
    }

    let session = state.db.get_session(id, auth.id).await?;
    let answers: Vec<String> = session
        .qa_data
        .into_iter()
        .map(|qa| qa.answer)
        .filter(|a| !a.trim().is_empty())
        .collect();

    Ok(Json(BenchmarkResponse {
        session_id: id,
        answers_analyzed: answers.len(),
        entries: benchmark(&answers, brand, &competitors),
    }))
}
