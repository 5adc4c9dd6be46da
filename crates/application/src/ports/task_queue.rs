//! Background task queue port

use std::future::Future;
use std::pin::Pin;

/// A unit of background work.
///
/// Tasks are `'static` and own everything they touch, so they outlive the
/// request that submitted them and are unaffected by its cancellation.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Bounded, best-effort queue of background work.
pub trait TaskQueue: Send + Sync {
    /// Offers a task to the queue.
    ///
    /// Never blocks. Returns `false` when the task was not accepted because
    /// the queue is full or shut down; the task is dropped in that case.
    fn submit(&self, task: Task) -> bool;
}
