//! Find user by external id use case

use renfound_domain::User;
use tracing::error;

use crate::error::{AuthError, AuthResult};
use crate::ports::{RepositoryError, UserRepository};

/// Looks a user up by their chat-platform id.
pub struct FindUserByExternalId<R> {
    repository: R,
}

impl<R: UserRepository> FindUserByExternalId<R> {
    /// Creates a new `FindUserByExternalId` use case.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Executes the use case.
    ///
    /// # Errors
    /// `UserNotFound` if nobody has logged in with that id; `Storage`
    /// otherwise.
    pub async fn execute(&self, external_id: i64) -> AuthResult<User> {
        match self.repository.get_user_by_external_id(external_id).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::NotFound) => Err(AuthError::UserNotFound),
            Err(e) => {
                error!(external_id, error = %e, "failed to look up user");
                Err(e.into())
            }
        }
    }
}
