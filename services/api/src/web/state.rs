//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and how it is assembled from `Config`.

use std::collections::HashMap;
use std::sync::Arc;

use genfuze_core::domain::ProviderKind;
use genfuze_core::ports::{
    AnswerAutomationService, ContentFetcher, DatabaseService, EmbeddingService, LlmProvider,
    WebSearchService,
};
use tracing::{info, warn};

use crate::adapters::browser::ExtractorConfig;
use crate::adapters::openai_llm::{openai_client, PERPLEXITY_API_BASE};
use crate::adapters::{
    BrowserAutomationAdapter, GeminiAdapter, HttpContentFetcher, OpenAiChatAdapter,
    OpenAiEmbeddingAdapter, SerperSearchAdapter,
};
use crate::auth::{AzureVerifier, JwtService};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub jwt: JwtService,
    /// `None` when Azure sign-in is not configured.
    pub azure: Option<Arc<AzureVerifier>>,
    /// Only providers with a configured key are present.
    pub providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
    pub embeddings: Option<Arc<dyn EmbeddingService>>,
    pub search: Option<Arc<dyn WebSearchService>>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub automation: Arc<dyn AnswerAutomationService>,
}

impl AppState {
    /// Builds every outbound adapter the configuration has credentials for.
    pub fn from_config(config: Arc<Config>, db: Arc<dyn DatabaseService>) -> ApiResult<Self> {
        let mut providers: HashMap<ProviderKind, Arc<dyn LlmProvider>> = HashMap::new();
        let mut embeddings: Option<Arc<dyn EmbeddingService>> = None;

        if let Some(key) = &config.openai_api_key {
            let client = openai_client(key, None);
            providers.insert(
                ProviderKind::OpenAi,
                Arc::new(OpenAiChatAdapter::new(client.clone(), config.openai_model.clone())),
            );
            embeddings = Some(Arc::new(OpenAiEmbeddingAdapter::new(
                client,
                config.embedding_model.clone(),
            )));
        }
        if let Some(key) = &config.perplexity_api_key {
            let client = openai_client(key, Some(PERPLEXITY_API_BASE));
            providers.insert(
                ProviderKind::Perplexity,
                Arc::new(OpenAiChatAdapter::new(client, config.perplexity_model.clone())),
            );
        }
        if let Some(key) = &config.gemini_api_key {
            providers.insert(
                ProviderKind::Gemini,
                Arc::new(GeminiAdapter::new(key.clone(), config.gemini_model.clone())?),
            );
        }

        let search: Option<Arc<dyn WebSearchService>> = match &config.serper_api_key {
            Some(key) => Some(Arc::new(SerperSearchAdapter::new(key)?)),
            None => None,
        };

        let azure = match &config.azure {
            Some(azure) => Some(Arc::new(AzureVerifier::new(azure)?)),
            None => None,
        };

        let mut names: Vec<&str> = providers.keys().map(|p| p.as_str()).collect();
        names.sort_unstable();
        info!("LLM providers configured: [{}]", names.join(", "));
        if search.is_none() {
            warn!("SERPER_API_KEY not set; web-grounded answers are disabled");
        }
        if azure.is_none() {
            info!("Azure AD sign-in is not configured");
        }

        Ok(Self {
            db,
            jwt: JwtService::new(&config.jwt_secret, config.access_token_expiry_secs),
            azure,
            providers,
            embeddings,
            search,
            fetcher: Arc::new(HttpContentFetcher::new()?),
            automation: Arc::new(BrowserAutomationAdapter::new(
                config.browser_debug_url.clone(),
                config.chat_url.clone(),
                ExtractorConfig::default(),
            )),
            config,
        })
    }

    /// Resolves a provider name from a request body.
    ///
    /// Unknown names and providers without a configured key are both client errors.
    pub fn provider(&self, name: &str) -> ApiResult<(ProviderKind, Arc<dyn LlmProvider>)> {
        let kind = name.parse::<ProviderKind>().map_err(ApiError::BadRequest)?;
        self.providers
            .get(&kind)
            .cloned()
            .map(|p| (kind, p))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("provider '{}' is not configured", kind.as_str()))
            })
    }
}
