//! Renfound Application - Auth flows and ports
//!
//! This crate holds the authentication use cases and the ports (traits) that
//! the infrastructure layer implements: repositories, the credential
//! verifier, the token authority, the background task queue and the clock.

pub mod auth;
pub mod error;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
mod test_support;

pub use auth::{AuthOrchestrator, AuthSettings, DEFAULT_CREDENTIAL_MAX_AGE};
pub use error::{AuthError, AuthResult, PublicError};
pub use use_cases::{DeleteCurrentUser, FindUserByExternalId, GetCurrentUser};
