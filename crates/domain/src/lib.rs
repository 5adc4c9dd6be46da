//! Renfound Domain - Core business types
//!
//! This crate defines the domain model for the Renfound authentication
//! service: users, the external identities they log in with, sessions and
//! tokens. All types here are pure Rust with no I/O dependencies.

pub mod error;
pub mod id;
pub mod session;
pub mod token;
pub mod user;

pub use error::{DomainError, DomainResult};
pub use id::{SessionId, UserId};
pub use session::{ClientInfo, Session};
pub use token::{Claims, TokenKind, TokenPair};
pub use user::{ExternalIdentity, User};
