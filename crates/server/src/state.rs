//! Shared handler state.

use std::sync::Arc;

use renfound_application::AuthOrchestrator;
use renfound_application::ports::{SessionRepository, UserRepository};

/// Cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Login, refresh and logout flows; also validates access tokens.
    pub auth: Arc<AuthOrchestrator>,
    /// User rows, for the profile endpoints.
    pub users: Arc<dyn UserRepository>,
    /// Session rows, for account deletion.
    pub sessions: Arc<dyn SessionRepository>,
}

impl AppState {
    /// Bundles the services.
    pub fn new(
        auth: AuthOrchestrator,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            auth: Arc::new(auth),
            users,
            sessions,
        }
    }
}
