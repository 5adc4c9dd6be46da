//! Authentication module for the Renfound service.
//!
//! This module provides:
//! - The auth orchestrator driving login, refresh, logout and logout-all
//! - Settings for the credential age window

mod orchestrator;

pub use orchestrator::{AuthOrchestrator, AuthSettings, DEFAULT_CREDENTIAL_MAX_AGE};

#[cfg(test)]
mod tests;
