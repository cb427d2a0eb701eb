pub mod domain;
pub mod export;
pub mod ports;
pub mod pricing;
pub mod prompts;
pub mod scoring;
pub mod similarity;
pub mod stats;

pub use domain::{
    Completion, ProviderKind, Prompt, QAData, QaPair, SearchResult, Session, SessionStatistics,
    SessionType, User, UserSession,
};
pub use ports::{
    AnswerAutomationService, ContentFetcher, DatabaseService, EmbeddingService, LlmProvider,
    PortError, PortResult, WebSearchService,
};
