//! Login, refresh and logout flows.
//!
//! Session creation is the only step taken off the request path: the new row
//! is handed to the background [`TaskQueue`] and the token pair is returned
//! without waiting. Until that write lands (or forever, if it is dropped) the
//! fresh refresh token is valid by signature but has no session, and the next
//! refresh with it fails as an invalid token. Everything else runs inline and
//! inherits the caller's cancellation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use renfound_domain::{ClientInfo, Session, TokenPair, User, UserId};
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::ports::{
    Clock, CredentialVerifier, RepositoryError, SessionRepository, TaskQueue, TokenAuthority,
    UserRepository,
};

/// Default maximum age of accepted init data.
pub const DEFAULT_CREDENTIAL_MAX_AGE: Duration = Duration::hours(24);

/// Tunables for the auth flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    /// Oldest acceptable `auth_date` in a login payload.
    pub credential_max_age: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            credential_max_age: DEFAULT_CREDENTIAL_MAX_AGE,
        }
    }
}

/// Composes verification, token issuance and the session store into the
/// four user-facing flows.
pub struct AuthOrchestrator {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    verifier: Arc<dyn CredentialVerifier>,
    tokens: Arc<dyn TokenAuthority>,
    tasks: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

impl AuthOrchestrator {
    /// Creates an orchestrator with default settings.
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        verifier: Arc<dyn CredentialVerifier>,
        tokens: Arc<dyn TokenAuthority>,
        tasks: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            sessions,
            verifier,
            tokens,
            tasks,
            clock,
            settings: AuthSettings::default(),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: AuthSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The token authority, for callers that validate access tokens.
    #[must_use]
    pub fn tokens(&self) -> &dyn TokenAuthority {
        self.tokens.as_ref()
    }

    /// Authenticates with signed init data.
    ///
    /// Creates the user on first login and overwrites their display fields on
    /// every later one. Session persistence is queued, not awaited.
    ///
    /// # Errors
    /// `InvalidCredentialPayload` if verification fails; `Storage` or
    /// `Internal` on store or signing failure.
    pub async fn login(&self, payload: &str, client: ClientInfo) -> AuthResult<TokenPair> {
        let identity = self
            .verifier
            .verify(payload, self.settings.credential_max_age)
            .map_err(|e| {
                warn!(reason = %e, "rejected login payload");
                AuthError::InvalidCredentialPayload
            })?;

        let now = self.clock.now();
        let external_id = identity.external_id;

        let user = match self.users.get_user_by_external_id(external_id).await {
            Ok(mut user) => {
                user.apply_identity(&identity, now);
                self.users
                    .update_user(&user)
                    .await
                    .map_err(|e| storage_failure("update user", e))?;
                user
            }
            Err(RepositoryError::NotFound) => {
                let user = User::from_identity(&identity, now);
                match self.users.create_user(&user).await {
                    Ok(()) => {
                        info!(user_id = %user.id, external_id, "created user");
                        user
                    }
                    // Lost a first-login race for the same external id.
                    Err(RepositoryError::Conflict(_)) => {
                        let mut existing = self
                            .users
                            .get_user_by_external_id(external_id)
                            .await
                            .map_err(|e| storage_failure("reload user", e))?;
                        existing.apply_identity(&identity, now);
                        self.users
                            .update_user(&existing)
                            .await
                            .map_err(|e| storage_failure("update user", e))?;
                        existing
                    }
                    Err(e) => return Err(storage_failure("create user", e)),
                }
            }
            Err(e) => return Err(storage_failure("get user by external id", e)),
        };

        let pair = self.issue_pair(&user)?;
        self.persist_session(user.id, &pair.refresh_token, client, now);

        info!(user_id = %user.id, external_id, "login succeeded");
        Ok(pair)
    }

    /// Rotates a refresh token into a new pair.
    ///
    /// The consumed token's session is deleted before the new pair is issued,
    /// so each refresh token works at most once. Of two concurrent refreshes
    /// with the same token only the one whose delete removes the row wins.
    ///
    /// # Errors
    /// `TokenExpired` or `TokenInvalid` for a rejected token, a missing or
    /// foreign session, a vanished user or a lost rotation race; `Storage`
    /// or `Internal` otherwise.
    pub async fn refresh(&self, refresh_token: &str, client: ClientInfo) -> AuthResult<TokenPair> {
        let user_id = self.tokens.validate_refresh_token(refresh_token).map_err(|e| {
            debug!(reason = %e, "refresh token rejected");
            AuthError::from(e)
        })?;

        let session = self
            .find_session(refresh_token)
            .await
            .map_err(|e| match e {
                AuthError::SessionNotFound => AuthError::TokenInvalid,
                other => other,
            })?;

        if session.user_id != user_id {
            warn!(
                token_user_id = %user_id,
                session_user_id = %session.user_id,
                "session owner does not match token subject"
            );
            return Err(AuthError::TokenInvalid);
        }

        let now = self.clock.now();
        if session.is_expired(now) {
            debug!(session_id = %session.id, "session past expiry");
            return Err(AuthError::TokenInvalid);
        }

        let user = match self.users.get_user_by_id(user_id).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound) => {
                warn!(%user_id, "refresh for a user that no longer exists");
                return Err(AuthError::TokenInvalid);
            }
            Err(e) => return Err(storage_failure("get user", e)),
        };

        let removed = self
            .sessions
            .delete_session(session.id)
            .await
            .map_err(|e| storage_failure("delete rotated session", e))?;
        if !removed {
            warn!(
                %user_id,
                session_id = %session.id,
                "refresh token already rotated by a concurrent request"
            );
            return Err(AuthError::TokenInvalid);
        }

        let pair = self.issue_pair(&user)?;
        self.persist_session(user.id, &pair.refresh_token, client, now);

        debug!(%user_id, old_session_id = %session.id, "rotated refresh token");
        Ok(pair)
    }

    /// Revokes the session behind a refresh token.
    ///
    /// No token validation happens: any string is looked up, and an unknown
    /// one is treated as already logged out.
    ///
    /// # Errors
    /// `Storage` if the store fails.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let session = match self.find_session(refresh_token).await {
            Ok(session) => session,
            Err(AuthError::SessionNotFound) => {
                debug!("logout for unknown session; nothing to do");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.sessions
            .delete_session(session.id)
            .await
            .map_err(|e| storage_failure("delete session", e))?;

        info!(user_id = %session.user_id, session_id = %session.id, "logged out");
        Ok(())
    }

    /// Revokes every session of a user.
    ///
    /// # Errors
    /// `Storage` if the store fails.
    pub async fn logout_all(&self, user_id: UserId) -> AuthResult<()> {
        let count = self
            .sessions
            .delete_user_sessions(user_id)
            .await
            .map_err(|e| storage_failure("delete user sessions", e))?;

        info!(%user_id, count, "logged out everywhere");
        Ok(())
    }

    async fn find_session(&self, refresh_token: &str) -> AuthResult<Session> {
        match self.sessions.get_session_by_token(refresh_token).await {
            Ok(session) => Ok(session),
            Err(RepositoryError::NotFound) => Err(AuthError::SessionNotFound),
            Err(e) => Err(storage_failure("get session by token", e)),
        }
    }

    fn issue_pair(&self, user: &User) -> AuthResult<TokenPair> {
        self.tokens
            .issue_pair(user.id, user.external_id)
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "failed to issue tokens");
                AuthError::from(e)
            })
    }

    /// Queues creation of the session for `refresh_token`.
    ///
    /// Failures and drops are logged and otherwise ignored.
    fn persist_session(
        &self,
        user_id: UserId,
        refresh_token: &str,
        client: ClientInfo,
        now: DateTime<Utc>,
    ) {
        let session = Session::new(user_id, refresh_token, client, self.tokens.refresh_ttl(), now);
        let session_id = session.id;
        let sessions = Arc::clone(&self.sessions);

        let accepted = self.tasks.submit(Box::pin(async move {
            match sessions.create_session(&session).await {
                Ok(()) => debug!(%user_id, session_id = %session.id, "session persisted"),
                Err(e) => error!(
                    %user_id,
                    session_id = %session.id,
                    error = %e,
                    "failed to persist session"
                ),
            }
        }));

        if !accepted {
            warn!(%user_id, %session_id, "session persistence dropped by task queue");
        }
    }
}

fn storage_failure(context: &'static str, error: RepositoryError) -> AuthError {
    error!(context, error = %error, "storage operation failed");
    AuthError::Storage(format!("{context}: {error}"))
}
