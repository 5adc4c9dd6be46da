//! Get current user use case

use renfound_domain::{User, UserId};
use tracing::error;

use crate::error::{AuthError, AuthResult};
use crate::ports::{RepositoryError, UserRepository};

/// Loads the profile of the authenticated user.
pub struct GetCurrentUser<R> {
    repository: R,
}

impl<R: UserRepository> GetCurrentUser<R> {
    /// Creates a new `GetCurrentUser` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case.
    ///
    /// # Errors
    /// `UserNotFound` if the id has no user row; `Storage` otherwise.
    pub async fn execute(&self, user_id: UserId) -> AuthResult<User> {
        match self.repository.get_user_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::NotFound) => Err(AuthError::UserNotFound),
            Err(e) => {
                error!(%user_id, error = %e, "failed to load user");
                Err(e.into())
            }
        }
    }
}
