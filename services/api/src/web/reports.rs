//! services/api/src/web/reports.rs
//!
//! Dashboard statistics and CSV export over the caller's saved sessions.

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::web::sessions::split_list;
use crate::web::state::AppState;
use genfuze_core::export::sessions_to_csv;
use genfuze_core::stats::{dashboard_stats, DashboardStats};

pub const EXPORT_FILENAME: &str = "genfuze-sessions.csv";

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// Comma-separated session ids; every session of the caller when absent.
    pub session_ids: Option<String>,
}

/// GET /api/stats - Aggregates over every session of the caller
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats)
    ),
    security(("bearer" = [])),
    tag = "reports"
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<DashboardStats>> {
    let sessions = state.db.list_sessions(auth.id, None).await?;
    Ok(Json(dashboard_stats(&sessions)))
}

/// GET /api/export/csv - Download sessions as CSV, one row per QA pair
#[utoipa::path(
    get,
    path = "/api/export/csv",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 400, description = "A session id is not a UUID"),
        (status = 404, description = "A listed session does not exist for this user")
    ),
    security(("bearer" = [])),
    tag = "reports"
)]
pub async fn export_csv_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let ids = split_list(query.session_ids.as_deref())
        .iter()
        .map(|raw| {
            Uuid::parse_str(raw)
                .map_err(|_| ApiError::BadRequest(format!("'{}' is not a session id", raw)))
        })
        .collect::<ApiResult<Vec<Uuid>>>()?;

    let sessions = if ids.is_empty() {
        state.db.list_sessions(auth.id, None).await?
    } else {
        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            sessions.push(state.db.get_session(id, auth.id).await?);
        }
        sessions
    };

    let body = sessions_to_csv(&sessions).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        body,
    ))
}
