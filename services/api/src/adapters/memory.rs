//! services/api/src/adapters/memory.rs
//!
//! The in-memory `DatabaseService` adapter. Also provides `StoreState`, the plain
//! data structure the JSON-file adapter persists.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genfuze_core::domain::{Session, SessionType, User, UserSession};
use genfuze_core::ports::{DatabaseService, PortError, PortResult};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Everything a store holds, keyed for direct lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub users: HashMap<Uuid, User>,
    /// Keyed by refresh token.
    #[serde(default)]
    pub user_sessions: HashMap<String, UserSession>,
    #[serde(default)]
    pub sessions: HashMap<Uuid, Session>,
}

impl StoreState {
    pub fn insert_user(&mut self, user: User) -> PortResult<User> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(PortError::Conflict(format!(
                "User with email {} already exists",
                user.email
            )));
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn user_by_email(&self, email: &str) -> PortResult<User> {
        let email = email.trim().to_lowercase();
        self.users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    pub fn user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    pub fn touch_last_login(&mut self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.last_login_at = Some(at);
        user.updated_at = at;
        Ok(())
    }

    pub fn user_session(&self, token: &str) -> PortResult<UserSession> {
        self.user_sessions
            .get(token)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Refresh token not found".to_string()))
    }

    pub fn delete_expired(&mut self, now: DateTime<Utc>) -> u64 {
        let before = self.user_sessions.len();
        self.user_sessions.retain(|_, s| !s.is_expired(now));
        (before - self.user_sessions.len()) as u64
    }

    pub fn insert_session(&mut self, session: Session) -> PortResult<Session> {
        if !self.users.contains_key(&session.user_id) {
            return Err(PortError::NotFound(format!("User {} not found", session.user_id)));
        }
        if self.sessions.contains_key(&session.id) {
            return Err(PortError::Conflict(format!("Session {} already exists", session.id)));
        }
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    pub fn session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<Session> {
        self.sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    pub fn sessions_for(&self, user_id: Uuid, session_type: Option<SessionType>) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .filter(|s| session_type.map_or(true, |t| s.session_type == t))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    pub fn remove_session(&mut self, session_id: Uuid, user_id: Uuid) -> bool {
        match self.sessions.get(&session_id) {
            Some(s) if s.user_id == user_id => {
                self.sessions.remove(&session_id);
                true
            }
            _ => false,
        }
    }
}

/// A `DatabaseService` that lives and dies with the process.
#[derive(Default)]
pub struct MemoryAdapter {
    state: RwLock<StoreState>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for MemoryAdapter {
    async fn create_user(&self, user: User) -> PortResult<User> {
        self.state.write().await.insert_user(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<User> {
        self.state.read().await.user_by_email(email)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.state.read().await.user_by_id(user_id)
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        self.state.write().await.touch_last_login(user_id, at)
    }

    async fn create_user_session(&self, session: UserSession) -> PortResult<()> {
        self.state
            .write()
            .await
            .user_sessions
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn get_user_session(&self, token: &str) -> PortResult<UserSession> {
        self.state.read().await.user_session(token)
    }

    async fn delete_user_session(&self, token: &str) -> PortResult<()> {
        self.state.write().await.user_sessions.remove(token);
        Ok(())
    }

    async fn delete_expired_user_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        Ok(self.state.write().await.delete_expired(now))
    }

    async fn save_session(&self, session: Session) -> PortResult<Session> {
        self.state.write().await.insert_session(session)
    }

    async fn get_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<Session> {
        self.state.read().await.session(session_id, user_id)
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        session_type: Option<SessionType>,
    ) -> PortResult<Vec<Session>> {
        Ok(self.state.read().await.sessions_for(user_id, session_type))
    }

    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        Ok(self.state.write().await.remove_session(session_id, user_id))
    }
}
