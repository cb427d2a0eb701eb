//! services/api/src/adapters/json_store.rs
//!
//! A `DatabaseService` persisted as a single JSON document. Every mutation is
//! written to a sibling temp file and renamed over the original, so a crash
//! leaves either the old or the new document on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genfuze_core::domain::{Session, SessionType, User, UserSession};
use genfuze_core::ports::{DatabaseService, PortError, PortResult};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::memory::StoreState;

pub struct JsonFileAdapter {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonFileAdapter {
    /// Loads the document at `path`, starting empty when it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> PortResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => StoreState::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PortError::Unexpected(format!("corrupt store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No store at {}, starting empty", path.display());
                StoreState::default()
            }
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &StoreState) -> PortResult<()> {
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| PortError::Unexpected(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// Applies `change` to a copy and writes it back. The copy replaces the
    /// in-memory state only once it is on disk.
    async fn mutate<T>(&self, change: impl FnOnce(&mut StoreState) -> PortResult<T>) -> PortResult<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(out)
    }
}

#[async_trait]
impl DatabaseService for JsonFileAdapter {
    async fn create_user(&self, user: User) -> PortResult<User> {
        self.mutate(|s| s.insert_user(user)).await
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<User> {
        self.state.read().await.user_by_email(email)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.state.read().await.user_by_id(user_id)
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        self.mutate(|s| s.touch_last_login(user_id, at)).await
    }

    async fn create_user_session(&self, session: UserSession) -> PortResult<()> {
        self.mutate(|s| {
            s.user_sessions.insert(session.token.clone(), session);
            Ok(())
        })
        .await
    }

    async fn get_user_session(&self, token: &str) -> PortResult<UserSession> {
        self.state.read().await.user_session(token)
    }

    async fn delete_user_session(&self, token: &str) -> PortResult<()> {
        self.mutate(|s| {
            s.user_sessions.remove(token);
            Ok(())
        })
        .await
    }

    async fn delete_expired_user_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        self.mutate(|s| Ok(s.delete_expired(now))).await
    }

    async fn save_session(&self, session: Session) -> PortResult<Session> {
        self.mutate(|s| s.insert_session(session)).await
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
        self.mutate(|s| Ok(s.remove_session(session_id, user_id))).await
    }
}
