//! Application error types
//!
//! [`AuthError`] keeps the full internal detail used in logs and tests.
//! [`PublicError`] is the coarse view handed to clients: storage and internal
//! detail never crosses that line, and a missing session reads as an invalid
//! token so the session table's shape cannot be inferred from responses.

use thiserror::Error;

use crate::ports::{RepositoryError, TokenError};

/// Errors produced by authentication and user operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The init data failed verification for any reason.
    #[error("invalid credential payload")]
    InvalidCredentialPayload,

    /// A token failed signature, algorithm, type or shape checks, or its
    /// session is gone.
    #[error("invalid token")]
    TokenInvalid,

    /// A token was well formed but past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// The addressed user does not exist.
    #[error("user not found")]
    UserNotFound,

    /// No session row matches the given refresh token.
    #[error("session not found")]
    SessionNotFound,

    /// A storage operation failed for a reason other than "not found".
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else, e.g. token signing failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Collapses this error to what a client is allowed to see.
    #[must_use]
    pub const fn public(&self) -> PublicError {
        match self {
            Self::InvalidCredentialPayload => PublicError::InvalidCredentials,
            Self::TokenInvalid | Self::SessionNotFound => PublicError::InvalidToken,
            Self::TokenExpired => PublicError::TokenExpired,
            Self::UserNotFound => PublicError::UserNotFound,
            Self::Storage(_) | Self::Internal(_) => PublicError::Internal,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid(_) => Self::TokenInvalid,
            TokenError::Signing(reason) => Self::Internal(reason),
        }
    }
}

impl From<RepositoryError> for AuthError {
    fn from(error: RepositoryError) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Client-visible error kinds.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PublicError {
    /// The login payload was rejected.
    #[error("invalid telegram init data")]
    InvalidCredentials,

    /// The client must re-authenticate.
    #[error("invalid token")]
    InvalidToken,

    /// The client may try a refresh.
    #[error("token expired")]
    TokenExpired,

    /// The addressed user does not exist.
    #[error("user not found")]
    UserNotFound,

    /// Opaque server-side failure.
    #[error("internal server error")]
    Internal,
}

/// Result type alias for application operations.
pub type AuthResult<T> = Result<T, AuthError>;
