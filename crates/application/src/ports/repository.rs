//! Repository ports for users and sessions.
//!
//! Every operation distinguishes "not found" from a storage failure so the
//! orchestrator can treat the two differently.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use renfound_domain::{Session, SessionId, User, UserId};

/// Errors reported by repository implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// No row matched.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Persistence for [`User`] rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user.
    ///
    /// # Errors
    /// Returns `RepositoryError::Conflict` if the id or external id is taken.
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Fetches a user by internal id.
    ///
    /// # Errors
    /// Returns `RepositoryError::NotFound` if no such user exists.
    async fn get_user_by_id(&self, id: UserId) -> Result<User, RepositoryError>;

    /// Fetches a user by platform id.
    ///
    /// # Errors
    /// Returns `RepositoryError::NotFound` if no such user exists.
    async fn get_user_by_external_id(&self, external_id: i64) -> Result<User, RepositoryError>;

    /// Overwrites the mutable attributes of an existing user.
    ///
    /// # Errors
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn update_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Deletes a user. Their sessions go with them.
    ///
    /// # Errors
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError>;
}

/// Persistence for [`Session`] rows.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts a new session.
    ///
    /// # Errors
    /// Returns `RepositoryError::Conflict` if the refresh token is already
    /// bound to another row.
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError>;

    /// Fetches the session holding exactly this refresh token.
    ///
    /// # Errors
    /// Returns `RepositoryError::NotFound` when no row matches, including
    /// rows already rotated away or reaped.
    async fn get_session_by_token(&self, refresh_token: &str) -> Result<Session, RepositoryError>;

    /// Deletes a session by id.
    ///
    /// Returns `Ok(true)` if a row was removed and `Ok(false)` if it was
    /// already gone. Absence is not an error.
    ///
    /// # Errors
    /// Returns `RepositoryError::Storage` if the store fails.
    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError>;

    /// Deletes every session owned by a user and returns how many went.
    ///
    /// # Errors
    /// Returns `RepositoryError::Storage` if the store fails.
    async fn delete_user_sessions(&self, user_id: UserId) -> Result<u64, RepositoryError>;

    /// Deletes sessions whose expiry is at or before `now`.
    ///
    /// # Errors
    /// Returns `RepositoryError::Storage` if the store fails.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

#[async_trait]
impl<T: UserRepository + ?Sized> UserRepository for Arc<T> {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        (**self).create_user(user).await
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, RepositoryError> {
        (**self).get_user_by_id(id).await
    }

    async fn get_user_by_external_id(&self, external_id: i64) -> Result<User, RepositoryError> {
        (**self).get_user_by_external_id(external_id).await
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        (**self).update_user(user).await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        (**self).delete_user(id).await
    }
}

#[async_trait]
impl<T: SessionRepository + ?Sized> SessionRepository for Arc<T> {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        (**self).create_session(session).await
    }

    async fn get_session_by_token(&self, refresh_token: &str) -> Result<Session, RepositoryError> {
        (**self).get_session_by_token(refresh_token).await
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        (**self).delete_session(id).await
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        (**self).delete_user_sessions(user_id).await
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        (**self).delete_expired_sessions(now).await
    }
}
