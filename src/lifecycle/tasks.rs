//! Ownership of detached background work.

use std::future::Future;

use tokio_util::task::TaskTracker;

/// Set of detached tasks (such as completion logging) drained at shutdown.
///
/// Cloning is cheap; every clone refers to the same set.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn a task owned by this set. Panics inside it are logged on join.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.tracker.spawn(task);
        self.tracker.spawn(async move {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background task failed");
            }
        });
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Close the set and wait for every task to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        tracing::debug!("Background tasks drained");
    }
}
