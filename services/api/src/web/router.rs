//! services/api/src/web/router.rs
//!
//! Assembles the public and protected routes, the Swagger UI, and the HTTP layers.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::error::ApiResult;
use crate::web::{
    auth, embeddings, llm,
    middleware::require_auth,
    reports,
    rest::{health_handler, ApiDoc},
    sessions,
    state::AppState,
};

/// Large enough for a long blog post pasted as `content`.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// `*` allows any origin; otherwise a comma-separated list of exact origins.
fn cors_layer(origins: &str) -> Result<CorsLayer, ConfigError> {
    let allow_origin = if origins.trim() == "*" {
        AllowOrigin::any()
    } else {
        let list = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| {
                o.parse::<HeaderValue>().map_err(|_| {
                    ConfigError::InvalidValue("CORS_ORIGIN".to_string(), format!("'{}'", o))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(list)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]))
}

pub fn build_router(app_state: Arc<AppState>) -> ApiResult<Router> {
    let cors = cors_layer(&app_state.config.cors_origin)?;

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/auth/azure", post(auth::azure_login_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me_handler))
        .route(
            "/api/sessions",
            post(sessions::save_session_handler).get(sessions::list_sessions_handler),
        )
        .route(
            "/api/sessions/{id}",
            get(sessions::get_session_handler).delete(sessions::delete_session_handler),
        )
        .route("/api/sessions/{id}/benchmark", get(sessions::benchmark_handler))
        .route("/api/stats", get(reports::stats_handler))
        .route("/api/export/csv", get(reports::export_csv_handler))
        .route("/api/generate-questions", post(llm::generate_questions_handler))
        .route("/api/generate-answers", post(llm::generate_answers_handler))
        .route("/api/generate-answers-web", post(llm::generate_web_answers_handler))
        .route("/api/generate-answers-browser", post(llm::browser_answers_handler))
        .route("/api/embeddings", post(embeddings::embeddings_handler))
        .route("/api/similarity", post(embeddings::similarity_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_parse() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("http://localhost:3000, https://app.example.com").is_ok());
        assert!(matches!(
            cors_layer("http://bad\norigin"),
            Err(ConfigError::InvalidValue(name, _)) if name == "CORS_ORIGIN"
        ));
    }
}
