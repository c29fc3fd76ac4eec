use crate::registry::{self, Detached, Handle, Registry};
use std::cell::RefCell;
use std::fmt;
use tracing::{debug, trace};

type LocalHandler<A> = Box<dyn FnMut(&A)>;

/// A synchronous event channel carrying arguments of type `A`.
///
/// Handlers run on the caller's thread, in registration order, every time the
/// event is triggered. `Event` is a single-owner type (`!Sync`): callers that
/// share it must serialize access themselves, or use
/// [`ThreadedEvent`](crate::ThreadedEvent) instead.
///
/// Handlers may call back into the same event while it dispatches: they can
/// register new handlers (which first fire on the next trigger), remove any
/// handler including themselves, or clear the event.
///
/// # Examples
///
/// ```rust
/// use herald_events::Event;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let clicked: Event<(i32, i32)> = Event::new();
/// let total = Rc::new(Cell::new(0));
///
/// let sink = Rc::clone(&total);
/// clicked.on(move |(x, y)| sink.set(sink.get() + x + y));
///
/// clicked.trigger((1, 2));
/// clicked.trigger((3, 4));
/// assert_eq!(total.get(), 10);
/// ```
pub struct Event<A> {
    registry: RefCell<Registry<LocalHandler<A>>>,
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event", &std::any::type_name::<A>())
            .field("handlers", &self.registry.try_borrow().map(|registry| registry.len()).ok())
            .finish()
    }
}

impl<A> Event<A> {
    /// Creates an event without handlers.
    #[must_use]
    pub fn new() -> Self {
        Self { registry: RefCell::new(Registry::new()) }
    }

    /// Registers a handler that fires on every trigger until removed.
    pub fn on<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + 'static,
    {
        self.registry.borrow_mut().insert(Box::new(handler), false)
    }

    /// Registers a handler that fires on the next trigger only.
    ///
    /// The registration is dropped right after the handler returns, so the
    /// returned handle goes stale at that point.
    pub fn once<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + 'static,
    {
        self.registry.borrow_mut().insert(Box::new(handler), true)
    }

    /// Invokes every handler with `args`.
    ///
    /// A panicking handler unwinds through this call; handlers after it do not
    /// run, but the registry stays consistent.
    pub fn trigger(&self, args: A) {
        self.emit(&args);
    }

    /// Invokes every handler with borrowed `args`.
    pub fn emit(&self, args: &A) {
        let fired = registry::dispatch(&self.registry, |handler| handler(args));
        trace!(event = std::any::type_name::<A>(), fired, "Event dispatched");
    }

    /// Removes the handler behind `handle`.
    ///
    /// Returns `false` if the handle is unknown, stale or already removed.
    pub fn remove(&self, handle: Handle) -> bool {
        let detached = self.registry.borrow_mut().remove(handle);
        detached.map(Detached::release).is_some()
    }

    /// Removes all handlers without invoking them and returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let (removed, spent) = self.registry.borrow_mut().clear();
        drop(spent);
        debug!(event = std::any::type_name::<A>(), removed, "Event handlers cleared");
        removed
    }

    /// Returns `true` if at least one handler is registered.
    #[must_use]
    pub fn has_handlers(&self) -> bool {
        !self.registry.borrow().is_empty()
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn count_handlers(&self) -> usize {
        self.registry.borrow().len()
    }
}
