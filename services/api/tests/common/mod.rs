//! Shared harness for the router-level tests: an in-memory app, stub ports, and
//! request helpers built on `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use api_lib::adapters::MemoryAdapter;
use api_lib::config::Config;
use api_lib::web::{build_router, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use genfuze_core::domain::{Completion, Prompt, QaPair, SearchResult};
use genfuze_core::ports::{AnswerAutomationService, LlmProvider, PortResult, WebSearchService};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-0123456789";
pub const PASSWORD: &str = "correct horse battery";

pub fn state() -> AppState {
    let config = Arc::new(Config::for_tests(SECRET));
    AppState::from_config(config, Arc::new(MemoryAdapter::new())).unwrap()
}

pub fn app(state: AppState) -> Router {
    build_router(Arc::new(state)).unwrap()
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply { status, headers, body }
}

pub async fn get(app: &Router, uri: &str, token: &str) -> Reply {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Reply {
    send(app, Method::POST, uri, token, Some(body)).await
}

/// Registers `email` and returns `(access_token, refresh_token)`.
pub async fn register(app: &Router, email: &str) -> (String, String) {
    let reply = post(
        app,
        "/api/auth/register",
        None,
        json!({"email": email, "password": PASSWORD}),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    let body = reply.json();
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

//=========================================================================================
// Stub ports
//=========================================================================================

/// Replies with a fixed text and usage; echoes the requested model when one is given.
pub struct StubProvider {
    pub text: String,
    pub model: String,
}

impl StubProvider {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> PortResult<Completion> {
        Ok(Completion {
            text: self.text.clone(),
            input_tokens: 1000,
            output_tokens: 500,
            model: prompt.model.clone().unwrap_or_else(|| self.model.clone()),
        })
    }
}

pub struct StubSearch;

#[async_trait]
impl WebSearchService for StubSearch {
    async fn search(&self, query: &str, limit: usize) -> PortResult<Vec<SearchResult>> {
        Ok((0..limit.min(2))
            .map(|i| SearchResult {
                title: format!("Result {} for {}", i, query),
                link: format!("https://example.com/{}", i),
                snippet: "snippet".to_string(),
            })
            .collect())
    }
}

/// Answers every question with a canned reply and records the chat URL it was given.
pub struct StubAutomation;

#[async_trait]
impl AnswerAutomationService for StubAutomation {
    async fn collect_answers(&self, questions: &[String], chat_url: Option<&str>) -> Vec<QaPair> {
        questions
            .iter()
            .map(|q| QaPair {
                question: q.clone(),
                answer: format!("answer from {}", chat_url.unwrap_or("default")),
            })
            .collect()
    }
}
