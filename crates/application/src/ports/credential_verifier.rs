//! Credential verifier port

use chrono::Duration;
use renfound_domain::ExternalIdentity;

/// Verification failure.
///
/// There is a single kind on purpose: callers must not be able to tell a bad
/// signature from a stale timestamp or a missing user object. The reason is
/// for logs only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credential payload: {0}")]
pub struct CredentialError(pub String);

impl CredentialError {
    /// Creates an error with a log-only reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Verifies a signed login payload issued by the chat platform.
pub trait CredentialVerifier: Send + Sync {
    /// Checks the payload's signature and age and extracts the identity.
    ///
    /// Never returns a partially populated identity; a payload without a
    /// user object is a failure.
    ///
    /// # Errors
    /// Returns [`CredentialError`] for every kind of verification failure.
    fn verify(&self, payload: &str, max_age: Duration) -> Result<ExternalIdentity, CredentialError>;
}
