//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier is malformed or empty.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A token type tag is not one of the known kinds.
    #[error("unknown token kind: {0}")]
    UnknownTokenKind(String),

    /// An external identity is missing a required field.
    #[error("incomplete identity: {0}")]
    IncompleteIdentity(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
