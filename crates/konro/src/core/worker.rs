//! Lifecycle management for the background admission task.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{sync::Notify, task::JoinHandle};

/// A handle owning the background admission task.
///
/// The task is spawned at construction and runs until the handle is
/// dropped or [`BatchWorkerHandle::shutdown`] is called. Waking the task
/// when new work arrives goes through [`BatchWorkerHandle::notify`].
pub(crate) struct BatchWorkerHandle {
    /// Cleared to ask the task to stop at its next check.
    running: Arc<AtomicBool>,

    /// Taken once shutdown is initiated.
    handle: Option<JoinHandle<()>>,

    /// Wakes the task when requests are queued.
    notifier: Arc<Notify>,
}

impl BatchWorkerHandle {
    /// Spawns the background task.
    ///
    /// `task` receives the running flag and the notifier and returns the
    /// spawned `JoinHandle`.
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> JoinHandle<()>,
    {
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let handle = task(running.clone(), notifier.clone());

        Self {
            running,
            handle: Some(handle),
            notifier,
        }
    }

    /// Wakes the task to look at the waiting queue.
    pub fn notify(&self) {
        self.notifier.notify_one();
    }

    /// Whether the task has been asked to keep running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Initiates a graceful shutdown: clears the running flag, wakes the
    /// task so it can observe it, and detaches the join handle.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_one();

        if let Some(handle) = self.handle.take() {
            tokio::spawn(async move {
                let _ = handle.await;
            });
        }
    }
}

impl Drop for BatchWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
