use crate::error::{EventErrorExt, Result};
use crate::executor::Executor;
use crate::future::OnceFuture;
use crate::registry::{self, Detached, Handle, Registry};
use herald_runtime::WorkerPool;
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

type SyncHandler<A> = Box<dyn FnMut(&A) + Send>;

struct Shared<A> {
    /// Guards registry mutation and dispatch. Re-entrant so handlers can
    /// register and remove handlers from the dispatching thread.
    registry: ReentrantMutex<RefCell<Registry<SyncHandler<A>>>>,
    /// Paired with `condvar`; waiters check their completion flag under it.
    signal: Mutex<()>,
    condvar: Condvar,
    /// Occurrences raised with `defer`, waiting for the owner to drain them.
    pending: Mutex<VecDeque<A>>,
    executor: Arc<dyn Executor>,
}

/// Wakes all waiters when a dispatch pass ends, even by unwinding.
struct NotifyOnDrop<'a, A>(&'a Shared<A>);

impl<A> Drop for NotifyOnDrop<'_, A> {
    fn drop(&mut self) {
        let _signal = self.0.signal.lock();
        self.0.condvar.notify_all();
    }
}

/// Marks a wait as fired once its handler returns or unwinds.
struct MarkOnDrop(Arc<AtomicBool>);

impl Drop for MarkOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Builder for [`ThreadedEvent`].
#[derive(Debug, Default)]
pub struct ThreadedEventBuilder {
    executor: Option<Arc<dyn Executor>>,
}

impl ThreadedEventBuilder {
    /// Runs asynchronous handlers and waits on `executor`.
    ///
    /// Defaults to the process-wide [`WorkerPool`].
    #[must_use = "The builder must be configured before it can be used to build the event."]
    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Like [`executor`](Self::executor), for an executor shared with other events.
    #[must_use = "The builder must be configured before it can be used to build the event."]
    pub fn shared_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build<A: Send + 'static>(self) -> ThreadedEvent<A> {
        let executor = self.executor.unwrap_or_else(|| Arc::new(WorkerPool::global()));
        ThreadedEvent {
            shared: Arc::new(Shared {
                registry: ReentrantMutex::new(RefCell::new(Registry::new())),
                signal: Mutex::new(()),
                condvar: Condvar::new(),
                pending: Mutex::new(VecDeque::new()),
                executor,
            }),
        }
    }
}

/// A thread-safe event with blocking waits, futures and off-thread handlers.
///
/// Cloning is cheap and yields another handle to the same event. One lock
/// serializes registration, removal and dispatch across threads; it is held
/// for the whole dispatch pass, so handlers registered from another thread
/// are never half-visible to a trigger in progress.
///
/// Handlers run under that lock. They may call `on`, `once`, `remove` and
/// `remove_all` on the same event, but must not call a blocking
/// [`wait`](Self::wait) on it: the trigger that would release the wait is the
/// one currently running, so such a wait only returns on timeout.
///
/// # Examples
///
/// ```rust
/// use herald_events::{ThreadExecutor, ThreadedEvent};
/// use std::thread;
/// use std::time::Duration;
///
/// let ready: ThreadedEvent<u64> = ThreadedEvent::with_executor(ThreadExecutor);
///
/// let producer = ready.clone();
/// let worker = thread::spawn(move || {
///     thread::sleep(Duration::from_millis(20));
///     producer.trigger(42);
/// });
///
/// assert_eq!(ready.next(Some(Duration::from_secs(5))), Some(42));
/// worker.join().unwrap();
/// ```
pub struct ThreadedEvent<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for ThreadedEvent<A> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<A> fmt::Debug for ThreadedEvent<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self
            .shared
            .registry
            .try_lock()
            .and_then(|registry| registry.try_borrow().map(|registry| registry.len()).ok());
        f.debug_struct("ThreadedEvent")
            .field("event", &std::any::type_name::<A>())
            .field("handlers", &handlers)
            .field("executor", &self.shared.executor)
            .finish()
    }
}

impl<A: Send + 'static> Default for ThreadedEvent<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + 'static> ThreadedEvent<A> {
    /// Creates an event that runs asynchronous work on the global [`WorkerPool`].
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an event that runs asynchronous work on `executor`.
    #[must_use]
    pub fn with_executor(executor: impl Executor + 'static) -> Self {
        Self::builder().executor(executor).build()
    }

    #[must_use]
    pub fn builder() -> ThreadedEventBuilder {
        ThreadedEventBuilder::default()
    }

    /// Registers a handler that fires on every trigger until removed.
    pub fn on<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.shared.registry.lock().borrow_mut().insert(Box::new(handler), false)
    }

    /// Registers a handler that fires on the next trigger only.
    pub fn once<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + Send + 'static,
    {
        self.shared.registry.lock().borrow_mut().insert(Box::new(handler), true)
    }

    /// Invokes every handler with `args` on the calling thread, then wakes all
    /// blocked waiters.
    pub fn trigger(&self, args: A) {
        self.emit(&args);
    }

    /// Invokes every handler with borrowed `args`, then wakes all blocked waiters.
    pub fn emit(&self, args: &A) {
        let registry = self.shared.registry.lock();
        let _notify = NotifyOnDrop(&self.shared);
        let fired = registry::dispatch(&registry, |handler| handler(args));
        trace!(event = std::any::type_name::<A>(), fired, "Event dispatched");
    }

    /// Removes the handler behind `handle`.
    ///
    /// Returns `false` if the handle is unknown, stale or already removed.
    pub fn remove(&self, handle: Handle) -> bool {
        let detached = self.shared.registry.lock().borrow_mut().remove(handle);
        detached.map(Detached::release).is_some()
    }

    /// Removes all handlers without invoking them and returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let (removed, spent) = self.shared.registry.lock().borrow_mut().clear();
        drop(spent);
        debug!(event = std::any::type_name::<A>(), removed, "Event handlers cleared");
        removed
    }

    #[must_use]
    pub fn has_handlers(&self) -> bool {
        !self.shared.registry.lock().borrow().is_empty()
    }

    #[must_use]
    pub fn count_handlers(&self) -> usize {
        self.shared.registry.lock().borrow().len()
    }

    /// Blocks until the next trigger. Returns `true` once it happened.
    pub fn wait(&self) -> bool {
        self.wait_with(|_| {}, None)
    }

    /// Blocks until the next trigger or until `timeout` elapses.
    ///
    /// Returns `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_with(|_| {}, Some(timeout))
    }

    /// Blocks until the next trigger, running `handler` with its arguments, or
    /// until `timeout` elapses. `None` waits without limit.
    ///
    /// Returns `true` if the trigger happened. On timeout the temporary
    /// registration is removed before returning, so a late trigger never
    /// runs `handler`. A trigger whose `handler` call panics still ends the
    /// wait with `true`; the panic itself reaches the triggering thread.
    pub fn wait_with<F>(&self, mut handler: F, timeout: Option<Duration>) -> bool
    where
        F: FnMut(&A) + Send + 'static,
    {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let armed = self.once(move |args| {
            let _fired = MarkOnDrop(Arc::clone(&flag));
            handler(args);
        });

        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        {
            let mut signal = self.shared.signal.lock();
            while !finished.load(Ordering::Acquire) {
                match deadline {
                    Some(deadline) => {
                        if self.shared.condvar.wait_until(&mut signal, deadline).timed_out() {
                            break;
                        }
                    },
                    None => self.shared.condvar.wait(&mut signal),
                }
            }
        }

        if finished.load(Ordering::Acquire) {
            return true;
        }
        if self.remove(armed) {
            debug!(event = std::any::type_name::<A>(), ?timeout, "Wait timed out");
            return false;
        }
        // The trigger won the race against the timeout.
        finished.load(Ordering::Acquire)
    }

    /// Blocks like [`wait_with`](Self::wait_with) and returns a copy of the
    /// delivered arguments, or `None` on timeout.
    pub fn next(&self, timeout: Option<Duration>) -> Option<A>
    where
        A: Clone,
    {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        if self.wait_with(move |args: &A| *sink.lock() = Some(args.clone()), timeout) {
            slot.lock().take()
        } else {
            None
        }
    }

    /// Runs [`wait_with`](Self::wait_with) on the executor and calls
    /// `on_timeout` if no trigger arrives within `timeout`.
    ///
    /// # Errors
    /// Returns [`EventError::Spawn`](crate::EventError::Spawn) if the executor
    /// could not start the wait.
    pub fn async_wait<F, T>(&self, handler: F, timeout: Duration, on_timeout: T) -> Result<()>
    where
        F: FnMut(&A) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let event = self.clone();
        self.shared
            .executor
            .execute(Box::new(move || {
                if !event.wait_with(handler, Some(timeout)) {
                    on_timeout();
                }
            }))
            .context("Failed to schedule asynchronous wait")
    }

    /// Registers a handler whose body runs on the executor with a copy of the
    /// arguments, instead of inline during the trigger.
    pub fn async_on<F>(&self, handler: F) -> Handle
    where
        A: Clone,
        F: Fn(A) + Send + Sync + 'static,
    {
        self.on(Self::offload(Arc::clone(&self.shared.executor), handler))
    }

    /// Like [`async_on`](Self::async_on), for the next trigger only.
    pub fn async_once<F>(&self, handler: F) -> Handle
    where
        A: Clone,
        F: Fn(A) + Send + Sync + 'static,
    {
        self.once(Self::offload(Arc::clone(&self.shared.executor), handler))
    }

    /// Returns a future resolved with the arguments of the next trigger.
    ///
    /// Later triggers do not affect an already resolved future. Dropping the
    /// event (or removing all handlers) first resolves it to
    /// [`EventError::Abandoned`](crate::EventError::Abandoned).
    pub fn future_once(&self) -> OnceFuture<A>
    where
        A: Clone,
    {
        let (sender, future) = OnceFuture::channel();
        let mut sender = Some(sender);
        self.once(move |args: &A| {
            if let Some(sender) = sender.take()
                && sender.send(args.clone()).is_err()
            {
                trace!(event = std::any::type_name::<A>(), "Future dropped before the event fired");
            }
        });
        future
    }

    /// Queues an occurrence for the owner to dispatch later with
    /// [`run_deferred`](Self::run_deferred). Safe to call from any thread.
    pub fn defer(&self, args: A) {
        let pending = {
            let mut queue = self.shared.pending.lock();
            queue.push_back(args);
            queue.len()
        };
        trace!(event = std::any::type_name::<A>(), pending, "Event deferred");
    }

    /// Dispatches the oldest deferred occurrence on the calling thread.
    ///
    /// Returns `true` while more remain.
    pub fn run_deferred(&self) -> bool {
        let next = self.shared.pending.lock().pop_front();
        if let Some(args) = next {
            self.trigger(args);
        }
        !self.shared.pending.lock().is_empty()
    }

    /// Dispatches deferred occurrences until none remain and returns how many ran.
    pub fn run_all_deferred(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.shared.pending.lock().pop_front();
            let Some(args) = next else { break };
            self.trigger(args);
            ran += 1;
        }
        ran
    }

    /// Drops all deferred occurrences without dispatching them.
    pub fn clear_deferred(&self) -> usize {
        let discarded = std::mem::take(&mut *self.shared.pending.lock());
        discarded.len()
    }

    /// Number of deferred occurrences waiting to be dispatched.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    fn offload<F>(executor: Arc<dyn Executor>, handler: F) -> impl FnMut(&A) + Send + 'static
    where
        A: Clone,
        F: Fn(A) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        move |args: &A| {
            let handler = Arc::clone(&handler);
            let args = args.clone();
            if let Err(error) = executor.execute(Box::new(move || handler(args))) {
                warn!(event = std::any::type_name::<A>(), %error, "Failed to offload handler");
            }
        }
    }
}
