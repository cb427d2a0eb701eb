//! crates/genfuze_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of any database, but they derive serde so the
//! JSON-file store and the web layer can share them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2 PHC string. `None` for accounts that only ever signed in through Azure AD.
    #[serde(default)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Builds a fresh user with the default `user` role.
    pub fn new(email: &str, password_hash: Option<String>, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            password_hash,
            name,
            roles: vec!["user".to_string()],
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}

/// A refresh-token record. One row per signed-in device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Whether a saved session holds generated questions or generated answers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Question,
    Answer,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Question => "question",
            SessionType::Answer => "answer",
        }
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "question" => Ok(SessionType::Question),
            "answer" => Ok(SessionType::Answer),
            other => Err(format!("unknown session type '{}'", other)),
        }
    }
}

/// A single generated question/answer pair with its token and cost metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct QAData {
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub cost: f64,
    /// 0..=100 when known.
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub question_embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub answer_embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub geo_score: Option<f64>,
}

/// Aggregates derived from a session's QA data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SessionStatistics {
    pub total_cost: f64,
    pub avg_accuracy: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub question_count: usize,
}

/// A saved batch of QA data plus the metadata describing where it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_type: SessionType,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub source_urls: Vec<String>,
    pub blog_content: Option<String>,
    pub qa_data: Vec<QAData>,
    pub statistics: SessionStatistics,
    pub created_at: DateTime<Utc>,
}

/// A question and whatever the browser automation managed to extract for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// The LLM backends the service can proxy to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Perplexity,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Perplexity => "perplexity",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "perplexity" => Ok(ProviderKind::Perplexity),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// A prompt ready to be sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Overrides the provider's default model when set.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// The text a provider produced plus the usage it reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
}

/// One web search hit used to ground an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_user_is_normalised() {
        let user = User::new("  Alice@Example.COM ", None, None);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.roles, vec!["user".to_string()]);
        assert!(user.last_login_at.is_none());
    }

    #[test]
    fn user_session_expiry() {
        let now = Utc::now();
        let session = UserSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at: now - Duration::seconds(1),
            created_at: now - Duration::days(1),
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - Duration::seconds(5)));
    }

    #[test]
    fn provider_and_session_type_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("claude".parse::<ProviderKind>().is_err());
        assert_eq!("Answer".parse::<SessionType>().unwrap(), SessionType::Answer);
        assert_eq!(serde_json::to_string(&SessionType::Question).unwrap(), "\"question\"");
    }

    #[test]
    fn qa_data_defaults_missing_fields() {
        let qa: QAData = serde_json::from_str(r#"{"question":"Why?"}"#).unwrap();
        assert_eq!(qa.question, "Why?");
        assert!(qa.answer.is_empty());
        assert!(qa.accuracy.is_none());
    }
}
