//! crates/genfuze_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Completion, Prompt, QaPair, SearchResult, Session, SessionType, User, UserSession};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Upstream service failed: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: User) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()>;

    // --- Refresh-token records ---
    async fn create_user_session(&self, session: UserSession) -> PortResult<()>;

    async fn get_user_session(&self, token: &str) -> PortResult<UserSession>;

    /// Idempotent: deleting an unknown token is not an error.
    async fn delete_user_session(&self, token: &str) -> PortResult<()>;

    /// Removes every record that expired at or before `now`; returns how many went.
    async fn delete_expired_user_sessions(&self, now: DateTime<Utc>) -> PortResult<u64>;

    // --- Saved sessions (always scoped to their owner) ---
    async fn save_session(&self, session: Session) -> PortResult<Session>;

    async fn get_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<Session>;

    /// Newest first.
    async fn list_sessions(
        &self,
        user_id: Uuid,
        session_type: Option<SessionType>,
    ) -> PortResult<Vec<Session>>;

    /// Returns `false` when nothing owned by `user_id` matched.
    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<bool>;
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// The model used when a prompt does not name one.
    fn default_model(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> PortResult<Completion>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns one vector per input text, in input order.
    async fn embed(&self, texts: &[String], model: Option<&str>) -> PortResult<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait WebSearchService: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> PortResult<Vec<SearchResult>>;
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Downloads a page and reduces it to readable text.
    async fn fetch_text(&self, url: &str) -> PortResult<String>;
}

#[async_trait]
pub trait AnswerAutomationService: Send + Sync {
    /// Always yields a result list: per-question failures become sentinel answers and a
    /// session-level failure becomes a single `[Automation error]` pair.
    async fn collect_answers(&self, questions: &[String], chat_url: Option<&str>) -> Vec<QaPair>;
}
