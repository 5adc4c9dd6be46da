//! Renfound Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer.

pub mod adapters;
pub mod auth;
pub mod persistence;
pub mod tasks;

pub use adapters::SystemClock;
pub use auth::{JwtTokenAuthority, TelegramInitDataVerifier, TokenSettings};
pub use persistence::{DatabaseSettings, InMemoryStore, PgStore};
pub use tasks::{ShutdownMode, WorkerPool, WorkerPoolSettings};
