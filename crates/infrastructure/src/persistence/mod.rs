//! User and session stores.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{DatabaseSettings, PgStore, redacted_url};
