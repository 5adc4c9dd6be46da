//! Token authority port

use chrono::Duration;
use renfound_domain::{Claims, TokenPair, UserId};

/// Errors from issuing or validating tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Signature and shape were fine but the token is past its expiry.
    #[error("token expired")]
    Expired,

    /// Bad signature, wrong algorithm, wrong token type or malformed claims.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The signing machinery itself failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Issues and validates access and refresh tokens.
///
/// Access and refresh tokens are signed with independent secrets, so neither
/// validator accepts the other's tokens.
pub trait TokenAuthority: Send + Sync {
    /// Signs an access token for the user.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` on signing infrastructure failure.
    fn issue_access_token(&self, user_id: UserId, external_id: i64) -> Result<String, TokenError>;

    /// Signs a refresh token carrying a fresh instance id.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` on signing infrastructure failure.
    fn issue_refresh_token(&self, user_id: UserId) -> Result<String, TokenError>;

    /// Validates an access token and returns its claims.
    ///
    /// # Errors
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError>;

    /// Validates a refresh token and returns the user it was issued to.
    ///
    /// # Errors
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    fn validate_refresh_token(&self, token: &str) -> Result<UserId, TokenError>;

    /// Lifetime of refresh tokens, used to size session expiry.
    fn refresh_ttl(&self) -> Duration;

    /// Issues an access and a refresh token together.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if either token cannot be signed.
    fn issue_pair(&self, user_id: UserId, external_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id, external_id)?,
            refresh_token: self.issue_refresh_token(user_id)?,
        })
    }
}
