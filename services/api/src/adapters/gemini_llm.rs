//! services/api/src/adapters/gemini_llm.rs
//!
//! An `LlmProvider` backed by Google's Gemini `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use genfuze_core::domain::{Completion, Prompt};
use genfuze_core::ports::{LlmProvider, PortError, PortResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

//=========================================================================================
// Wire types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

//=========================================================================================
// The Adapter
//=========================================================================================

#[derive(Clone)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiAdapter {
    pub fn new(api_key: String, model: String) -> PortResult<Self> {
        Self::with_base_url(api_key, model, GEMINI_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiAdapter {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> PortResult<Completion> {
        let model = prompt.model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &prompt.system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt.user }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: prompt.max_tokens,
            },
        };

        debug!("Sending generateContent to model {}", model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(PortError::Upstream(format!("Gemini returned {}: {}", status, message)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Upstream(format!("Unreadable Gemini response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(PortError::Upstream("Gemini returned no text".to_string()));
        }

        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(Completion {
            text: text.trim().to_string(),
            input_tokens,
            output_tokens,
            model: parsed.model_version.unwrap_or_else(|| model.to_string()),
        })
    }
}
