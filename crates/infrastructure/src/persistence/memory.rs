//! In-process store for development and tests.
//!
//! Enforces the same constraints as the relational schema: unique external
//! id, unique refresh token, sessions must reference an existing user and
//! disappear with it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use renfound_application::ports::{RepositoryError, SessionRepository, UserRepository};
use renfound_domain::{Session, SessionId, User, UserId};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    sessions: HashMap<SessionId, Session>,
}

/// Both repositories over one lock-protected set of maps.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Number of live session rows.
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict(format!("user {} exists", user.id)));
        }
        if tables.users.values().any(|u| u.external_id == user.external_id) {
            return Err(RepositoryError::Conflict(format!(
                "external id {} is taken",
                user.external_id
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, RepositoryError> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_user_by_external_id(&self, external_id: i64) -> Result<User, RepositoryError> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables.users.get_mut(&user.id).ok_or(RepositoryError::NotFound)?;
        stored.username.clone_from(&user.username);
        stored.first_name.clone_from(&user.first_name);
        stored.last_name.clone_from(&user.last_name);
        stored.photo_url.clone_from(&user.photo_url);
        stored.auth_date = user.auth_date;
        stored.updated_at = user.updated_at;
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.users.remove(&id).ok_or(RepositoryError::NotFound)?;
        tables.sessions.retain(|_, s| s.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&session.user_id) {
            return Err(RepositoryError::Conflict(format!(
                "user {} does not exist",
                session.user_id
            )));
        }
        if tables
            .sessions
            .values()
            .any(|s| s.refresh_token == session.refresh_token)
        {
            return Err(RepositoryError::Conflict(
                "refresh token already has a session".to_string(),
            ));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session_by_token(&self, refresh_token: &str) -> Result<Session, RepositoryError> {
        self.tables
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.refresh_token == refresh_token)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        Ok(self.tables.write().await.sessions.remove(&id).is_some())
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}
