use crate::error::{EventError, EventErrorExt, Result};
use herald_runtime::WorkerPool;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// A unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs concurrently with the caller.
///
/// [`ThreadedEvent`](crate::ThreadedEvent) uses an executor for handlers
/// registered through `async_on`/`async_once` and for `async_wait`.
pub trait Executor: Send + Sync + fmt::Debug {
    /// Submits `job` for execution and returns without waiting for it.
    ///
    /// # Errors
    /// Returns [`EventError::Spawn`](crate::EventError::Spawn) if the job could
    /// not be started.
    fn execute(&self, job: Job) -> Result<()>;
}

/// Runs jobs on the blocking pool of the pool's tokio runtime.
///
/// Fails with [`EventError::Spawn`] once the runtime has shut down: tokio
/// cancels such a job on the spot, before it ever starts.
impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<()> {
        let started = Arc::new(AtomicBool::new(false));
        let running = Arc::clone(&started);
        let task = self.spawn(move || {
            running.store(true, Ordering::Release);
            job();
        });

        if task.is_finished() && !started.load(Ordering::Acquire) {
            return Err(EventError::Spawn {
                source: io::Error::other("worker runtime is shut down"),
                context: Some("Failed to queue job on the worker pool".into()),
            });
        }
        Ok(())
    }
}

/// Starts a dedicated OS thread per job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) -> Result<()> {
        thread::Builder::new()
            .name("herald-job".to_owned())
            .spawn(job)
            .map(drop)
            .context("Failed to start handler thread")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_runtime::{RuntimeConfig, build_runtime};
    use std::sync::mpsc;
    use std::time::Duration;

    fn pool() -> (tokio::runtime::Runtime, WorkerPool) {
        let runtime = build_runtime(&RuntimeConfig::default().with_worker_threads(1)).unwrap();
        let pool = WorkerPool::from_runtime(&runtime);
        (runtime, pool)
    }

    #[test]
    fn test_worker_pool_runs_jobs() {
        let (_runtime, pool) = pool();
        let (tx, rx) = mpsc::channel();

        pool.execute(Box::new(move || tx.send(5).unwrap())).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 5);
    }

    #[test]
    fn test_worker_pool_rejects_jobs_after_shutdown() {
        let (runtime, pool) = pool();
        drop(runtime);

        let (tx, rx) = mpsc::channel::<()>();
        let error = pool.execute(Box::new(move || tx.send(()).unwrap())).unwrap_err();

        assert!(matches!(error, EventError::Spawn { context: Some(_), .. }));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err(), "job must not run");
    }

    #[test]
    fn test_thread_executor_names_its_threads() {
        let (tx, rx) = mpsc::channel();
        ThreadExecutor
            .execute(Box::new(move || {
                tx.send(thread::current().name().map(str::to_owned)).unwrap();
            }))
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("herald-job"));
    }
}
