//! services/api/src/web/llm.rs
//!
//! Question and answer generation proxied to the configured LLM providers, plus
//! the browser-automation answer collector.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;
use genfuze_core::domain::{Completion, Prompt, QAData, QaPair, SearchResult};
use genfuze_core::ports::{LlmProvider, PortError};
use genfuze_core::pricing::cost_for;
use genfuze_core::prompts::{
    answer_prompt, parse_questions, question_prompt, web_answer_prompt, MAX_QUESTIONS,
};
use genfuze_core::scoring::{fanout_score, geo_score};
use genfuze_core::similarity::{cosine_similarity, similarity_to_accuracy};

pub const DEFAULT_QUESTION_COUNT: usize = 5;
/// Organic results requested from the search API per question.
pub const WEB_RESULTS_PER_QUESTION: usize = 5;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct GenerateQuestionsRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// 1..=20, default 5.
    #[serde(default)]
    pub question_count: Option<usize>,
    #[serde(default)]
    pub target_keywords: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GenerateQuestionsResponse {
    pub questions: Vec<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub provider: String,
    pub model: String,
    /// How much of the source content the questions cover, 0..=100.
    pub fanout_score: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateAnswersRequest {
    pub questions: Vec<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub target_keywords: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GenerateAnswersResponse {
    pub answers: Vec<QAData>,
    pub total_cost: f64,
    pub provider: String,
    pub model: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateWebAnswersRequest {
    pub questions: Vec<String>,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct WebAnswer {
    #[serde(flatten)]
    pub qa: QAData,
    pub sources: Vec<SearchResult>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GenerateWebAnswersResponse {
    pub answers: Vec<WebAnswer>,
    pub total_cost: f64,
    pub provider: String,
    pub model: String,
}

#[derive(Deserialize, ToSchema)]
pub struct BrowserAnswersRequest {
    pub questions: Vec<String>,
    /// Overrides the configured chat URL.
    #[serde(default)]
    pub chat_url: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct BrowserAnswersResponse {
    pub answers: Vec<QaPair>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn clean_questions(questions: Vec<String>) -> ApiResult<Vec<String>> {
    let questions: Vec<String> = questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if questions.is_empty() {
        return Err(ApiError::BadRequest("at least one question is required".to_string()));
    }
    Ok(questions)
}

fn question_count(requested: Option<usize>) -> ApiResult<usize> {
    let count = requested.unwrap_or(DEFAULT_QUESTION_COUNT);
    if !(1..=MAX_QUESTIONS).contains(&count) {
        return Err(ApiError::BadRequest(format!(
            "question_count must be between 1 and {}",
            MAX_QUESTIONS
        )));
    }
    Ok(count)
}

async fn complete_with(
    provider: &dyn LlmProvider,
    mut prompt: Prompt,
    model: Option<&str>,
) -> ApiResult<Completion> {
    prompt.model = model.map(str::trim).filter(|m| !m.is_empty()).map(str::to_string);
    Ok(provider.complete(&prompt).await?)
}

fn qa_from_completion(question: String, completion: &Completion, keywords: &[String]) -> QAData {
    QAData {
        geo_score: Some(geo_score(&completion.text, keywords)),
        cost: cost_for(&completion.model, completion.input_tokens, completion.output_tokens),
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        answer: completion.text.trim().to_string(),
        question,
        ..Default::default()
    }
}

/// Embeds each question/answer pair and derives accuracy from their similarity.
/// Best effort: without an embedding service, or on failure, the fields stay empty.
async fn attach_embeddings(state: &AppState, qa: &mut QAData) {
    let Some(embeddings) = &state.embeddings else {
        return;
    };
    if qa.answer.is_empty() {
        return;
    }
    match embeddings.embed(&[qa.question.clone(), qa.answer.clone()], None).await {
        Ok(mut vectors) if vectors.len() == 2 => {
            let answer = vectors.pop().unwrap_or_default();
            let question = vectors.pop().unwrap_or_default();
            qa.accuracy = Some(similarity_to_accuracy(cosine_similarity(&question, &answer)));
            qa.question_embedding = Some(question);
            qa.answer_embedding = Some(answer);
        }
        Ok(vectors) => warn!("Embedding service returned {} vectors for 2 inputs", vectors.len()),
        Err(e) => warn!("Skipping accuracy for one answer: {}", e),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/generate-questions - Generate questions from text or fetched URLs
#[utoipa::path(
    post,
    path = "/api/generate-questions",
    request_body = GenerateQuestionsRequest,
    responses(
        (status = 200, description = "Generated questions", body = GenerateQuestionsResponse),
        (status = 400, description = "No content, bad count, or unknown provider"),
        (status = 502, description = "Provider or URL fetch failed")
    ),
    security(("bearer" = [])),
    tag = "generation"
)]
pub async fn generate_questions_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateQuestionsRequest>,
) -> ApiResult<Json<GenerateQuestionsResponse>> {
    let count = question_count(req.question_count)?;
    let (kind, provider) = state.provider(&req.provider)?;

    // 1. Gather the source text
    let mut parts: Vec<String> = req
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .into_iter()
        .collect();
    let urls: Vec<&str> = req.urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect();
    let mut last_fetch_error: Option<PortError> = None;
    for url in &urls {
        match state.fetcher.fetch_text(url).await {
            Ok(text) if !text.trim().is_empty() => parts.push(text),
            Ok(_) => warn!("No readable text at {}", url),
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                last_fetch_error = Some(e);
            }
        }
    }
    if parts.is_empty() {
        return Err(match last_fetch_error {
            Some(e) => e.into(),
            None => ApiError::BadRequest("content or urls with readable text is required".to_string()),
        });
    }
    let content = parts.join("\n\n");

    // 2. Ask the provider
    let prompt = question_prompt(kind, &content, count, &req.target_keywords);
    let completion = complete_with(provider.as_ref(), prompt, req.model.as_deref()).await?;
    let questions = parse_questions(&completion.text, count);
    if questions.is_empty() {
        return Err(PortError::Upstream("the provider returned no questions".to_string()).into());
    }
    info!(
        "Generated {} questions with {} ({})",
        questions.len(),
        kind.as_str(),
        completion.model
    );

    Ok(Json(GenerateQuestionsResponse {
        fanout_score: fanout_score(&questions, &content),
        cost: cost_for(&completion.model, completion.input_tokens, completion.output_tokens),
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        provider: kind.as_str().to_string(),
        model: completion.model,
        questions,
    }))
}

/// POST /api/generate-answers - Answer each question, optionally grounded on content
#[utoipa::path(
    post,
    path = "/api/generate-answers",
    request_body = GenerateAnswersRequest,
    responses(
        (status = 200, description = "One answer per question", body = GenerateAnswersResponse),
        (status = 400, description = "No questions or unknown provider"),
        (status = 502, description = "Provider failed")
    ),
    security(("bearer" = [])),
    tag = "generation"
)]
pub async fn generate_answers_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateAnswersRequest>,
) -> ApiResult<Json<GenerateAnswersResponse>> {
    let questions = clean_questions(req.questions)?;
    let (kind, provider) = state.provider(&req.provider)?;

    let mut answers = Vec::with_capacity(questions.len());
    let mut model = provider.default_model().to_string();
    for question in questions {
        let prompt = answer_prompt(&question, req.content.as_deref(), &req.target_keywords);
        let completion = complete_with(provider.as_ref(), prompt, req.model.as_deref()).await?;
        let mut qa = qa_from_completion(question, &completion, &req.target_keywords);
        attach_embeddings(&state, &mut qa).await;
        model = completion.model;
        answers.push(qa);
    }

    info!("Generated {} answers with {} ({})", answers.len(), kind.as_str(), model);
    Ok(Json(GenerateAnswersResponse {
        total_cost: answers.iter().map(|a| a.cost).sum(),
        answers,
        provider: kind.as_str().to_string(),
        model,
    }))
}

/// POST /api/generate-answers-web - Answer each question grounded on live search results
#[utoipa::path(
    post,
    path = "/api/generate-answers-web",
    request_body = GenerateWebAnswersRequest,
    responses(
        (status = 200, description = "One answer per question with its sources", body = GenerateWebAnswersResponse),
        (status = 400, description = "No questions or unknown provider"),
        (status = 502, description = "Search or provider failed"),
        (status = 503, description = "Web search is not configured")
    ),
    security(("bearer" = [])),
    tag = "generation"
)]
pub async fn generate_web_answers_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateWebAnswersRequest>,
) -> ApiResult<Json<GenerateWebAnswersResponse>> {
    let search = state
        .search
        .clone()
        .ok_or_else(|| ApiError::Unavailable("web search is not configured".to_string()))?;
    let questions = clean_questions(req.questions)?;
    let (kind, provider) = state.provider(&req.provider)?;

    let mut answers = Vec::with_capacity(questions.len());
    let mut model = provider.default_model().to_string();
    for question in questions {
        let sources = search.search(&question, WEB_RESULTS_PER_QUESTION).await?;
        let prompt = web_answer_prompt(&question, &sources);
        let completion = complete_with(provider.as_ref(), prompt, req.model.as_deref()).await?;
        let mut qa = qa_from_completion(question, &completion, &[]);
        attach_embeddings(&state, &mut qa).await;
        model = completion.model;
        answers.push(WebAnswer { qa, sources });
    }

    info!("Generated {} web-grounded answers with {}", answers.len(), kind.as_str());
    Ok(Json(GenerateWebAnswersResponse {
        total_cost: answers.iter().map(|a| a.qa.cost).sum(),
        answers,
        provider: kind.as_str().to_string(),
        model,
    }))
}

/// POST /api/generate-answers-browser - Collect answers by driving a chat UI in a browser
///
/// Failures are reported inside the list as bracketed placeholder answers, so this
/// route answers 200 whenever the request body is valid.
#[utoipa::path(
    post,
    path = "/api/generate-answers-browser",
    request_body = BrowserAnswersRequest,
    responses(
        (status = 200, description = "One pair per question, or a single automation error pair", body = BrowserAnswersResponse)
    ),
    security(("bearer" = [])),
    tag = "generation"
)]
pub async fn browser_answers_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BrowserAnswersRequest>,
) -> Json<BrowserAnswersResponse> {
    let questions: Vec<String> = req
        .questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    let answers = state
        .automation
        .collect_answers(&questions, req.chat_url.as_deref())
        .await;
    Json(BrowserAnswersResponse { answers })
}
