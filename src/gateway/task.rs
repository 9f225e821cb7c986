//! Background task ownership.

use std::future::Future;

use tokio::task::JoinHandle;

/// Owns a background task and aborts it when dropped.
///
/// Returned by [`GeocodingService::subscribe_to_config`] and
/// [`GeocodingService::spawn_cache_pruner`]; keep it alive for as long as
/// the task should run.
///
/// [`GeocodingService::subscribe_to_config`]: super::GeocodingService::subscribe_to_config
/// [`GeocodingService::spawn_cache_pruner`]: super::GeocodingService::spawn_cache_pruner
#[must_use = "the background task stops when the guard is dropped"]
#[derive(Debug)]
pub struct TaskGuard {
    handle: JoinHandle<()>,
}

impl TaskGuard {
    /// Spawn `task` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub(crate) fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(task),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
