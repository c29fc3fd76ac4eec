//! # Runtime
//!
//! Execution context for event handlers that must not run on the triggering
//! thread.
//!
//! A [`WorkerPool`] hands closures to the blocking pool of a
//! [Tokio](https://tokio.rs) runtime. Handlers are ordinary synchronous
//! closures, so they run as blocking tasks and never stall the async workers.
//!
//! ## Configuration
//! [`RuntimeConfig`] controls thread counts, naming and stack size. The
//! defaults read `HERALD_WORKER_THREADS` and `HERALD_BLOCKING_THREADS` from the
//! environment.
//!
//! ## Example
//!
//! ```rust
//! use herald_runtime::{RuntimeConfig, WorkerPool, build_runtime};
//! use std::sync::mpsc;
//!
//! let runtime = build_runtime(&RuntimeConfig::default().with_worker_threads(1))?;
//! let pool = WorkerPool::from_runtime(&runtime);
//!
//! let (tx, rx) = mpsc::channel();
//! pool.spawn(move || tx.send(7).unwrap());
//! assert_eq!(rx.recv().unwrap(), 7);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub use anyhow::Result;

use anyhow::anyhow;
use std::sync::OnceLock;
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Environment variable overriding the number of async worker threads.
pub const WORKER_THREADS_ENV: &str = "HERALD_WORKER_THREADS";
/// Environment variable overriding the size of the blocking pool.
pub const BLOCKING_THREADS_ENV: &str = "HERALD_BLOCKING_THREADS";

/// Async workers only drive timers and wakeups.
const DEFAULT_WORKER_THREADS: usize = 2;
const DEFAULT_BLOCKING_THREADS: usize = 64;
const MAX_THREADS: usize = 1024;
/// The default stack size for pool threads (2 `MiB`).
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 256 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const DEFAULT_THREAD_NAME: &str = "herald-worker";
/// How long an idle blocking thread stays alive.
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(10);

fn parse_threads(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok().filter(|&n| n > 0 && n <= MAX_THREADS)
}

fn env_threads(var: &str) -> Option<usize> {
    std::env::var(var).ok().as_deref().and_then(parse_threads)
}

/// Configuration for the runtime behind a [`WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub blocking_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let worker_threads = env_threads(WORKER_THREADS_ENV).unwrap_or_else(|| {
            available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(DEFAULT_WORKER_THREADS)
                .min(DEFAULT_WORKER_THREADS)
        });

        Self {
            worker_threads,
            blocking_threads: env_threads(BLOCKING_THREADS_ENV)
                .unwrap_or(DEFAULT_BLOCKING_THREADS),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }
}

impl RuntimeConfig {
    #[must_use = "Customize the number of async worker threads"]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_THREADS);
        self
    }

    /// Caps how many handlers can run concurrently on the pool.
    #[must_use = "Customize the size of the blocking pool"]
    pub fn with_blocking_threads(mut self, threads: usize) -> Self {
        self.blocking_threads = threads.clamp(1, MAX_THREADS);
        self
    }

    #[must_use = "Customize the stack size for pool threads"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.thread_name =
            if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name };
        self
    }

    #[must_use = "Customize how long idle threads stay alive"]
    pub const fn with_thread_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.thread_keep_alive = keep_alive;
        self
    }

    /// Re-applies the builder bounds to a configuration whose fields were set
    /// directly.
    fn normalized(&self) -> Self {
        self.clone()
            .with_worker_threads(self.worker_threads)
            .with_blocking_threads(self.blocking_threads)
            .with_stack_size(self.stack_size)
            .with_thread_name(self.thread_name.clone())
    }
}

/// Builds a multi-threaded Tokio runtime from `config`.
///
/// # Errors
///
/// Returns an [`anyhow::Error`] if the runtime cannot be created, typically
/// because the OS refused to spawn threads.
pub fn build_runtime(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config.normalized();
    debug!(config = ?config, "Building worker runtime");

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.blocking_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to initialize worker runtime: {e}"))
}

static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Access the lazily initialized process-wide runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be initialized (e.g., the OS refuses to
/// allocate threads). This is considered a fatal system error.
pub fn global_runtime() -> &'static Runtime {
    GLOBAL_RUNTIME.get_or_init(|| {
        let config = RuntimeConfig::default();
        info!(
            workers = config.worker_threads,
            blocking = config.blocking_threads,
            "Initializing global worker runtime"
        );
        build_runtime(&config).expect("CRITICAL: Failed to initialize global worker runtime")
    })
}

/// Runs closures on the blocking pool of a Tokio runtime.
///
/// The pool only borrows the runtime through its [`Handle`]; whoever built the
/// runtime keeps ownership of it.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
}

impl WorkerPool {
    /// The pool backed by [`global_runtime`].
    #[must_use]
    pub fn global() -> Self {
        Self::from_runtime(global_runtime())
    }

    #[must_use]
    pub fn from_runtime(runtime: &Runtime) -> Self {
        Self { handle: runtime.handle().clone() }
    }

    #[must_use]
    pub const fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// The pool of the runtime the caller is running on, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::from_handle)
    }

    /// Runs `job` on the blocking pool.
    ///
    /// Dropping the returned handle detaches the job; it still runs to completion.
    pub fn spawn<F, R>(&self, job: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(job)
    }

    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }
}
