//! services/api/src/web/rest.rs
//!
//! Contains the health endpoint and the master definition for the OpenAPI
//! specification.

use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

use crate::web::state::AppState;
use crate::web::{auth, embeddings, llm, reports, sessions};
use genfuze_core::domain::{QAData, QaPair, SearchResult, Session, SessionStatistics, SessionType};
use genfuze_core::stats::{BenchmarkEntry, CostBucket, DashboardStats};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::azure_login_handler,
        auth::me_handler,
        sessions::save_session_handler,
        sessions::list_sessions_handler,
        sessions::get_session_handler,
        sessions::delete_session_handler,
        sessions::benchmark_handler,
        reports::stats_handler,
        reports::export_csv_handler,
        llm::generate_questions_handler,
        llm::generate_answers_handler,
        llm::generate_web_answers_handler,
        llm::browser_answers_handler,
        embeddings::embeddings_handler,
        embeddings::similarity_handler,
    ),
    components(
        schemas(
            HealthResponse,
            auth::RegisterRequest, auth::LoginRequest, auth::RefreshRequest,
            auth::AzureLoginRequest, auth::UserView, auth::TokenResponse,
            sessions::SaveSessionRequest, sessions::BenchmarkResponse,
            llm::GenerateQuestionsRequest, llm::GenerateQuestionsResponse,
            llm::GenerateAnswersRequest, llm::GenerateAnswersResponse,
            llm::GenerateWebAnswersRequest, llm::GenerateWebAnswersResponse, llm::WebAnswer,
            llm::BrowserAnswersRequest, llm::BrowserAnswersResponse,
            embeddings::EmbeddingsRequest, embeddings::EmbeddingsResponse,
            embeddings::SimilarityRequest, embeddings::SimilarityResponse,
            Session, SessionType, SessionStatistics, QAData, QaPair, SearchResult,
            DashboardStats, CostBucket, BenchmarkEntry,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Accounts, tokens and Azure AD sign-in."),
        (name = "sessions", description = "Saved question and answer sessions."),
        (name = "reports", description = "Dashboard statistics and CSV export."),
        (name = "generation", description = "LLM and browser-driven question and answer generation."),
        (name = "embeddings", description = "Embedding vectors and similarity.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Providers with a configured key.
    pub providers: Vec<String>,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut providers: Vec<String> = state.providers.keys().map(|p| p.as_str().to_string()).collect();
    providers.sort_unstable();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers,
    })
}
