//! Background execution of expired task bodies.
//!
//! The driver never runs a task body inline — spawning a firing is always
//! non-blocking, fire-and-forget. [`Executor`] is the seam: the default
//! [`ThreadExecutor`] spawns a bare OS thread per firing (closest to the Go
//! source's `go func() { taskEntry.task.Run() }()`), while [`TokioExecutor`]
//! hands the job to a tokio runtime via `spawn_blocking`, for callers who
//! already run under tokio and want firings to share that runtime's thread
//! pool instead of spawning bare OS threads.

use std::sync::Arc;

/// A place to run an expired task's `run()` without blocking the driver.
pub trait Executor: Send + Sync {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Spawns a detached OS thread per job. Simple, always available, and the
/// right default for a library that must not assume a particular async
/// runtime is already running.
#[derive(Default)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        std::thread::spawn(job);
    }
}

/// Runs jobs on a tokio runtime via `spawn_blocking`, so task bodies that
/// block (the common case for arbitrary user callables) don't starve the
/// runtime's async worker threads.
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    /// Bind to the currently-entered tokio runtime.
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }

    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        self.handle.spawn_blocking(job);
    }
}

pub(crate) fn default_executor() -> Arc<dyn Executor> {
    Arc::new(ThreadExecutor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn thread_executor_runs_job() {
        let (tx, rx) = mpsc::channel();
        ThreadExecutor.spawn(Box::new(move || tx.send(42).unwrap()));
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap(), 42);
    }

    #[tokio::test]
    async fn tokio_executor_runs_job() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let executor = TokioExecutor::current();
        executor.spawn(Box::new(move || {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.await.unwrap(), 7);
    }
}
