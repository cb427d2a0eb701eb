//! services/api/src/web/embeddings.rs
//!
//! Embedding vectors and cosine similarity.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;
use genfuze_core::similarity::cosine_similarity;

#[derive(Deserialize, ToSchema)]
pub struct EmbeddingsRequest {
    pub texts: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct EmbeddingsResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SimilarityRequest {
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SimilarityResponse {
    pub similarity: f32,
}

/// POST /api/embeddings - Embed a batch of texts
#[utoipa::path(
    post,
    path = "/api/embeddings",
    request_body = EmbeddingsRequest,
    responses(
        (status = 200, description = "One vector per text, in input order", body = EmbeddingsResponse),
        (status = 400, description = "No texts given"),
        (status = 502, description = "Embedding provider failed"),
        (status = 503, description = "No OpenAI key configured")
    ),
    security(("bearer" = [])),
    tag = "embeddings"
)]
pub async fn embeddings_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmbeddingsRequest>,
) -> ApiResult<Json<EmbeddingsResponse>> {
    let service = state
        .embeddings
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("embeddings need OPENAI_API_KEY".to_string()))?;
    if req.texts.is_empty() {
        return Err(ApiError::BadRequest("texts must not be empty".to_string()));
    }

    let model = req
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.config.embedding_model.clone());
    let embeddings = service.embed(&req.texts, Some(&model)).await?;
    Ok(Json(EmbeddingsResponse { embeddings, model }))
}

/// POST /api/similarity - Cosine similarity of two vectors
#[utoipa::path(
    post,
    path = "/api/similarity",
    request_body = SimilarityRequest,
    responses(
        (status = 200, description = "0 for empty, zero-norm or mismatched vectors", body = SimilarityResponse)
    ),
    security(("bearer" = [])),
    tag = "embeddings"
)]
pub async fn similarity_handler(Json(req): Json<SimilarityRequest>) -> Json<SimilarityResponse> {
    Json(SimilarityResponse {
        similarity: cosine_similarity(&req.a, &req.b),
    })
}
