//! Clock port for time-related operations

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Port for getting the current time.
///
/// Token lifetimes, session expiry and init-data age checks all read time
/// through this trait so tests can pin it.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
