//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod clock;
mod credential_verifier;
mod repository;
mod task_queue;
mod token_authority;

pub use clock::Clock;
pub use credential_verifier::{CredentialError, CredentialVerifier};
pub use repository::{RepositoryError, SessionRepository, UserRepository};
pub use task_queue::{Task, TaskQueue};
pub use token_authority::{TokenAuthority, TokenError};
