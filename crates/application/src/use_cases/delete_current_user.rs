//! Delete current user use case

use renfound_domain::UserId;
use tracing::{error, info};

use crate::error::{AuthError, AuthResult};
use crate::ports::{RepositoryError, SessionRepository, UserRepository};

/// Deletes the authenticated user's account and every session they hold.
pub struct DeleteCurrentUser<U, S> {
    users: U,
    sessions: S,
}

impl<U: UserRepository, S: SessionRepository> DeleteCurrentUser<U, S> {
    /// Creates a new `DeleteCurrentUser` use case.
    pub const fn new(users: U, sessions: S) -> Self {
        Self { users, sessions }
    }

    /// Executes the use case.
    ///
    /// Sessions go first so no refresh token outlives the account even when
    /// the store does not cascade.
    ///
    /// # Errors
    /// `UserNotFound` if the user row was already gone; `Storage` otherwise.
    pub async fn execute(&self, user_id: UserId) -> AuthResult<()> {
        let revoked = self
            .sessions
            .delete_user_sessions(user_id)
            .await
            .map_err(|e| {
                error!(%user_id, error = %e, "failed to delete user sessions");
                AuthError::from(e)
            })?;

        match self.users.delete_user(user_id).await {
            Ok(()) => {
                info!(%user_id, revoked, "deleted user");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(AuthError::UserNotFound),
            Err(e) => {
                error!(%user_id, error = %e, "failed to delete user");
                Err(e.into())
            }
        }
    }
}
