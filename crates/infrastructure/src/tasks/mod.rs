//! Background execution of fire-and-forget work.

mod worker_pool;

pub use worker_pool::{ShutdownMode, WorkerPool, WorkerPoolSettings};
