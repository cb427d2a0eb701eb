//! services/api/src/adapters/serper.rs
//!
//! Google search through serper.dev, used to ground web answers.

use std::time::Duration;

use async_trait::async_trait;
use genfuze_core::domain::SearchResult;
use genfuze_core::ports::{PortError, PortResult, WebSearchService};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

pub const SERPER_API_BASE: &str = "https://google.serper.dev";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerperResponse {
    #[serde(default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    organic: Vec<Organic>,
}

#[derive(Deserialize)]
struct AnswerBox {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Deserialize)]
struct Organic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Clone)]
pub struct SerperSearchAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl SerperSearchAdapter {
    pub fn new(api_key: &str) -> PortResult<Self> {
        Self::with_base_url(api_key, SERPER_API_BASE)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> PortResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| PortError::InvalidInput("SERPER_API_KEY is not a valid header value".to_string()))?;
        headers.insert("X-API-KEY", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl WebSearchService for SerperSearchAdapter {
    /// The answer box, when present, comes first; organic results fill the rest up to `limit`.
    async fn search(&self, query: &str, limit: usize) -> PortResult<Vec<SearchResult>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&json!({ "q": query, "num": limit }))
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("Serper request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Upstream(format!("Serper returned {}: {}", status, body)));
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .map_err(|e| PortError::Upstream(format!("Unreadable Serper response: {}", e)))?;

        let mut results = Vec::with_capacity(limit + 1);
        if let Some(answer_box) = parsed.answer_box {
            if let Some(snippet) = answer_box.answer.or(answer_box.snippet) {
                results.push(SearchResult {
                    title: answer_box.title.unwrap_or_else(|| "Answer box".to_string()),
                    link: answer_box.link.unwrap_or_default(),
                    snippet,
                });
            }
        }
        results.extend(parsed.organic.into_iter().take(limit).map(|o| SearchResult {
            title: o.title,
            link: o.link,
            snippet: o.snippet,
        }));
        Ok(results)
    }
}
