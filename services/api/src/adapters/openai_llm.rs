//! services/api/src/adapters/openai_llm.rs
//!
//! Chat completions and embeddings over the OpenAI API. Perplexity exposes the
//! same chat-completions surface, so the same adapter serves it with a different
//! API base.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use genfuze_core::domain::{Completion, Prompt};
use genfuze_core::ports::{EmbeddingService, LlmProvider, PortError, PortResult};
use tracing::debug;

pub const PERPLEXITY_API_BASE: &str = "https://api.perplexity.ai";

fn upstream(e: OpenAIError) -> PortError {
    PortError::Upstream(e.to_string())
}

/// Builds a client for `api_key`, optionally pointed at another OpenAI-compatible base.
pub fn openai_client(api_key: &str, api_base: Option<&str>) -> Client<OpenAIConfig> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }
    Client::with_config(config)
}

// Perplexity only understands `max_tokens`, which newer OpenAI models mark deprecated.
#[allow(deprecated)]
fn set_max_tokens(args: &mut CreateChatCompletionRequestArgs, max_tokens: u32) {
    args.max_tokens(max_tokens);
}

//=========================================================================================
// Chat completions
//=========================================================================================

/// An `LlmProvider` for any OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OpenAiChatAdapter {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> PortResult<Completion> {
        let model = prompt.model.as_deref().unwrap_or(&self.model);

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt.system.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt.user.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(model).messages(messages).temperature(0.7);
        if let Some(max_tokens) = prompt.max_tokens {
            set_max_tokens(&mut args, max_tokens);
        }
        let request = args.build().map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!("Sending chat completion to model {}", model);
        let response = self.client.chat().create(request).await.map_err(upstream)?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Upstream("The provider returned no choices".to_string()))?;

        let (input_tokens, output_tokens) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(Completion {
            text: text.trim().to_string(),
            input_tokens,
            output_tokens,
            model: response.model,
        })
    }
}

//=========================================================================================
// Embeddings
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    async fn embed(&self, texts: &[String], model: Option<&str>) -> PortResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(model.unwrap_or(&self.model))
            .input(texts.to_vec())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self.client.embeddings().create(request).await.map_err(upstream)?;

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        if data.len() != texts.len() {
            return Err(PortError::Upstream(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prompt() -> Prompt {
        Prompt {
            system: "Be brief.".into(),
            user: "What is GEO?".into(),
            model: None,
            max_tokens: Some(50),
        }
    }

    #[tokio::test]
    async fn completion_carries_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "  Generative engine optimisation.  "},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiChatAdapter::new(
            openai_client("test-key", Some(&server.uri())),
            "gpt-4o-mini".into(),
        );
        let completion = adapter.complete(&prompt()).await.unwrap();
        assert_eq!(completion.text, "Generative engine optimisation.");
        assert_eq!(completion.input_tokens, 12);
        assert_eq!(completion.output_tokens, 5);
        assert_eq!(completion.model, "gpt-4o-mini-2024-07-18");
    }

    #[tokio::test]
    async fn prompt_model_overrides_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "sonar-pro"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "x",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "sonar-pro",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "ok"},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiChatAdapter::new(openai_client("k", Some(&server.uri())), "sonar".into());
        let mut p = prompt();
        p.model = Some("sonar-pro".into());
        let completion = adapter.complete(&p).await.unwrap();
        assert_eq!(completion.model, "sonar-pro");
        assert_eq!(completion.input_tokens, 0);
    }

    #[tokio::test]
    async fn api_errors_are_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "bad model", "type": "invalid_request_error", "param": null, "code": null}
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiChatAdapter::new(openai_client("k", Some(&server.uri())), "nope".into());
        assert!(matches!(adapter.complete(&prompt()).await, Err(PortError::Upstream(_))));
    }

    #[tokio::test]
    async fn embeddings_follow_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
                ],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiEmbeddingAdapter::new(
            openai_client("k", Some(&server.uri())),
            "text-embedding-3-small".into(),
        );
        let vectors = adapter
            .embed(&["first".to_string(), "second".to_string()], None)
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
