//! Fixed-size pool of tokio workers draining one bounded queue.
//!
//! Submission never blocks: a full or closed queue rejects the task and the
//! caller decides what that means. A panicking task is logged and the worker
//! moves on to the next one.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use parking_lot::Mutex;
use renfound_application::ports::{Task, TaskQueue};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pool dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolSettings {
    /// Number of worker tasks.
    pub workers: usize,
    /// Capacity of the shared queue.
    pub queue_size: usize,
}

impl Default for WorkerPoolSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_size: 100,
        }
    }
}

/// How [`WorkerPool::shutdown`] treats queued work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop intake, run everything already queued, wait for the workers.
    Drain,
    /// Stop intake and tell workers to quit after their current task.
    /// Queued tasks are dropped and nothing is awaited.
    Immediate,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>;

/// Bounded best-effort task queue served by a fixed set of workers.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawns the workers on the current tokio runtime.
    ///
    /// Zero workers or a zero-sized queue are raised to one.
    #[must_use]
    pub fn start(settings: WorkerPoolSettings) -> Self {
        let workers = settings.workers.max(1);
        let (sender, receiver) = mpsc::channel(settings.queue_size.max(1));
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let (stop, _) = watch::channel(false);

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker(worker_id, Arc::clone(&receiver), stop.subscribe()))
            })
            .collect();

        info!(workers, queue_size = settings.queue_size, "worker pool started");

        Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
            stop,
        }
    }

    /// Stops the pool. Later calls and later submissions are no-ops.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        if self.sender.lock().take().is_some() {
            info!(?mode, "shutting down worker pool");
        }

        match mode {
            ShutdownMode::Immediate => {
                self.stop.send_replace(true);
            }
            ShutdownMode::Drain => {
                let handles = std::mem::take(&mut *self.handles.lock());
                if handles.is_empty() {
                    return;
                }
                debug!("waiting for workers to drain the queue");
                for handle in handles {
                    if let Err(e) = handle.await {
                        error!(error = %e, "worker task failed");
                    }
                }
                info!("worker pool shutdown complete");
            }
        }
    }
}

impl TaskQueue for WorkerPool {
    fn submit(&self, task: Task) -> bool {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            debug!("task rejected: worker pool is shut down");
            return false;
        };
        match sender.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("task rejected: worker pool queue is full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("task rejected: worker pool queue is closed");
                false
            }
        }
    }
}

async fn worker(worker_id: usize, receiver: SharedReceiver, mut stop: watch::Receiver<bool>) {
    debug!(worker_id, "worker started");
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = stop.changed() => None,
                task = receiver.recv() => task,
            }
        };
        let Some(task) = next else {
            break;
        };

        let started = Instant::now();
        if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
            error!(worker_id, panic = panic_message(payload.as_ref()), "task panicked");
        }
        debug!(worker_id, elapsed_ms = started.elapsed().as_millis(), "task completed");
    }
    debug!(worker_id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic")
}
