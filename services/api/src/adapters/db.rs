//! services/api/src/adapters/db.rs
//!
//! This module contains the SQLite database adapter, the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genfuze_core::domain::{QAData, Session, SessionStatistics, SessionType, User, UserSession};
use genfuze_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file behind `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn parse_uuid(raw: &str) -> PortResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| PortError::Unexpected(format!("corrupt id '{}': {}", raw, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> PortResult<String> {
    serde_json::to_string(value).map_err(unexpected)
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> PortResult<T> {
    serde_json::from_str(raw).map_err(unexpected)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: String,
    email: String,
    password_hash: Option<String>,
    name: Option<String>,
    roles: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            roles: from_json(&self.roles)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
        })
    }
}

#[derive(FromRow)]
struct UserSessionRecord {
    id: String,
    user_id: String,
    token: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
impl UserSessionRecord {
    fn to_domain(self) -> PortResult<UserSession> {
        Ok(UserSession {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            token: self.token,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    user_id: String,
    session_type: String,
    name: String,
    provider: String,
    model: String,
    source_urls: String,
    blog_content: Option<String>,
    total_cost: f64,
    avg_accuracy: f64,
    total_input_tokens: i64,
    total_output_tokens: i64,
    question_count: i64,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self, qa_data: Vec<QAData>) -> PortResult<Session> {
        Ok(Session {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            session_type: SessionType::from_str(&self.session_type).map_err(PortError::Unexpected)?,
            name: self.name,
            provider: self.provider,
            model: self.model,
            source_urls: from_json(&self.source_urls)?,
            blog_content: self.blog_content,
            qa_data,
            statistics: SessionStatistics {
                total_cost: self.total_cost,
                avg_accuracy: self.avg_accuracy,
                total_input_tokens: self.total_input_tokens.max(0) as u64,
                total_output_tokens: self.total_output_tokens.max(0) as u64,
                question_count: self.question_count.max(0) as usize,
            },
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct QADataRecord {
    question: String,
    answer: String,
    input_tokens: i64,
    output_tokens: i64,
    cost: f64,
    accuracy: Option<f64>,
    question_embedding: Option<String>,
    answer_embedding: Option<String>,
    geo_score: Option<f64>,
}
impl QADataRecord {
    fn to_domain(self) -> PortResult<QAData> {
        Ok(QAData {
            question: self.question,
            answer: self.answer,
            input_tokens: self.input_tokens.max(0) as u32,
            output_tokens: self.output_tokens.max(0) as u32,
            cost: self.cost,
            accuracy: self.accuracy,
            question_embedding: self.question_embedding.as_deref().map(from_json).transpose()?,
            answer_embedding: self.answer_embedding.as_deref().map(from_json).transpose()?,
            geo_score: self.geo_score,
        })
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, roles, created_at, updated_at, last_login_at";
const SESSION_COLUMNS: &str = "id, user_id, session_type, name, provider, model, source_urls, \
     blog_content, total_cost, avg_accuracy, total_input_tokens, total_output_tokens, \
     question_count, created_at";

impl DbAdapter {
    async fn load_qa_data(&self, session_id: &str) -> PortResult<Vec<QAData>> {
        let records = sqlx::query_as::<_, QADataRecord>(
            "SELECT question, answer, input_tokens, output_tokens, cost, accuracy, \
             question_embedding, answer_embedding, geo_score \
             FROM qa_data WHERE session_id = ? ORDER BY position ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, user: User) -> PortResult<User> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, roles, created_at, updated_at, last_login_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(to_json(&user.roles)?)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(PortError::Conflict(
                format!("User with email {} already exists", user.email),
            )),
            Err(e) => Err(unexpected(e)),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<User> {
        let email = email.trim().to_lowercase();
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(&email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(at)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn create_user_session(&self, session: UserSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_sessions (id, user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_user_session(&self, token: &str) -> PortResult<UserSession> {
        let record = sqlx::query_as::<_, UserSessionRecord>(
            "SELECT id, user_id, token, expires_at, created_at FROM user_sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Refresh token not found".to_string()),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn delete_user_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM user_sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_expired_user_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn save_session(&self, session: Session) -> PortResult<Session> {
        let id = session.id.to_string();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(&format!(
            "INSERT INTO sessions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SESSION_COLUMNS
        ))
        .bind(&id)
        .bind(session.user_id.to_string())
        .bind(session.session_type.as_str())
        .bind(&session.name)
        .bind(&session.provider)
        .bind(&session.model)
        .bind(to_json(&session.source_urls)?)
        .bind(&session.blog_content)
        .bind(session.statistics.total_cost)
        .bind(session.statistics.avg_accuracy)
        .bind(session.statistics.total_input_tokens as i64)
        .bind(session.statistics.total_output_tokens as i64)
        .bind(session.statistics.question_count as i64)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Session {} already exists", id))
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                PortError::NotFound(format!("User {} not found", session.user_id))
            }
            other => unexpected(other),
        })?;

        for (position, qa) in session.qa_data.iter().enumerate() {
            let question_embedding = qa.question_embedding.as_ref().map(to_json).transpose()?;
            let answer_embedding = qa.answer_embedding.as_ref().map(to_json).transpose()?;
            sqlx::query(
                "INSERT INTO qa_data (session_id, position, question, answer, input_tokens, output_tokens, \
                 cost, accuracy, question_embedding, answer_embedding, geo_score) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(position as i64)
            .bind(&qa.question)
            .bind(&qa.answer)
            .bind(qa.input_tokens as i64)
            .bind(qa.output_tokens as i64)
            .bind(qa.cost)
            .bind(qa.accuracy)
            .bind(question_embedding)
            .bind(answer_embedding)
            .bind(qa.geo_score)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<Session> {
        let id = session_id.to_string();
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM sessions WHERE id = ? AND user_id = ?",
            SESSION_COLUMNS
        ))
        .bind(&id)
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Session {} not found", session_id)),
            _ => unexpected(e),
        })?;

        let qa_data = self.load_qa_data(&id).await?;
        record.to_domain(qa_data)
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        session_type: Option<SessionType>,
    ) -> PortResult<Vec<Session>> {
        let records = match session_type {
            Some(t) => {
                sqlx::query_as::<_, SessionRecord>(&format!(
                    "SELECT {} FROM sessions WHERE user_id = ? AND session_type = ? ORDER BY created_at DESC",
                    SESSION_COLUMNS
                ))
                .bind(user_id.to_string())
                .bind(t.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, SessionRecord>(&format!(
                    "SELECT {} FROM sessions WHERE user_id = ? ORDER BY created_at DESC",
                    SESSION_COLUMNS
                ))
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(unexpected)?;

        let mut sessions = Vec::with_capacity(records.len());
        for record in records {
            let qa_data = self.load_qa_data(&record.id).await?;
            sessions.push(record.to_domain(qa_data)?);
        }
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ? AND user_id = ?")
            .bind(session_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store_contract;

    async fn adapter() -> (DbAdapter, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genfuze.db");
        let db = DbAdapter::connect(&format!("sqlite://{}", path.display())).await.unwrap();
        db.run_migrations().await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn sqlite_user_lifecycle() {
        let (db, _dir) = adapter().await;
        store_contract::user_lifecycle(&db).await;
    }

    #[tokio::test]
    async fn sqlite_refresh_tokens() {
        let (db, _dir) = adapter().await;
        store_contract::refresh_tokens(&db).await;
    }

    #[tokio::test]
    async fn sqlite_session_ownership() {
        let (db, _dir) = adapter().await;
        store_contract::session_ownership(&db).await;
    }

    #[tokio::test]
    async fn sqlite_keeps_embeddings_and_order() {
        let (db, _dir) = adapter().await;
        store_contract::qa_round_trip(&db).await;
    }
}
