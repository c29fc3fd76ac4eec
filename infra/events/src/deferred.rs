use crate::event::Event;
use crate::registry::Handle;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

type Action = Box<dyn FnOnce()>;

/// FIFO of deferred actions, drained explicitly by its owner.
///
/// Cloning the queue yields another handle to the same pending actions, which
/// lets several [`DeferredEvent`]s share one ordering. Like [`Event`], the queue
/// is single-owner (`!Sync`).
#[derive(Clone, Default)]
pub struct DeferredQueue {
    actions: Rc<RefCell<VecDeque<Action>>>,
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue").field("pending", &self.len()).finish()
    }
}

impl DeferredQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `action` to the back of the queue.
    pub fn push<F>(&self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.actions.borrow_mut().push_back(Box::new(action));
    }

    /// Runs the oldest pending action, if any.
    ///
    /// Returns `true` while more actions remain. The action runs after the
    /// queue is released, so it may push further actions.
    pub fn run_one(&self) -> bool {
        let action = self.actions.borrow_mut().pop_front();
        if let Some(action) = action {
            action();
        }
        !self.is_empty()
    }

    /// Runs actions until the queue is empty and returns how many ran.
    ///
    /// Actions pushed while draining are run by the same call.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let action = self.actions.borrow_mut().pop_front();
            let Some(action) = action else { break };
            action();
            ran += 1;
        }
        if ran > 0 {
            debug!(ran, "Deferred queue drained");
        }
        ran
    }

    /// Discards all pending actions without running them and returns how many
    /// were discarded.
    pub fn clear(&self) -> usize {
        let discarded = std::mem::take(&mut *self.actions.borrow_mut());
        discarded.len()
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.borrow().is_empty()
    }
}

/// An [`Event`] whose triggers are queued instead of dispatched.
///
/// `trigger` captures its arguments and appends an action to a
/// [`DeferredQueue`]; handlers only run when the owner drains the queue with
/// [`run_deferred`](Self::run_deferred) or
/// [`run_all_deferred`](Self::run_all_deferred). Pending actions hold a weak
/// reference to the event: once the event is dropped they drain as no-ops.
///
/// # Examples
///
/// ```rust
/// use herald_events::DeferredEvent;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let resized: DeferredEvent<(u32, u32)> = DeferredEvent::new();
/// let area = Rc::new(Cell::new(0));
///
/// let sink = Rc::clone(&area);
/// resized.on(move |(w, h)| sink.set(w * h));
///
/// resized.trigger((4, 3));
/// assert_eq!(area.get(), 0);
///
/// assert!(!resized.run_deferred());
/// assert_eq!(area.get(), 12);
/// ```
pub struct DeferredEvent<A> {
    event: Rc<Event<A>>,
    queue: DeferredQueue,
}

impl<A: 'static> Default for DeferredEvent<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for DeferredEvent<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEvent").field("event", &self.event).field("queue", &self.queue).finish()
    }
}

impl<A: 'static> DeferredEvent<A> {
    /// Creates a deferred event with its own queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue(DeferredQueue::new())
    }

    /// Creates a deferred event that appends to `queue`.
    ///
    /// Events sharing a queue drain their occurrences in the order they were
    /// triggered, across all of them.
    #[must_use]
    pub fn with_queue(queue: DeferredQueue) -> Self {
        Self { event: Rc::new(Event::new()), queue }
    }

    /// The queue this event appends to.
    #[must_use]
    pub const fn queue(&self) -> &DeferredQueue {
        &self.queue
    }

    /// Registers a handler that fires on every drained occurrence until removed.
    pub fn on<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + 'static,
    {
        self.event.on(handler)
    }

    /// Registers a handler that fires on the next drained occurrence only.
    pub fn once<F>(&self, handler: F) -> Handle
    where
        F: FnMut(&A) + 'static,
    {
        self.event.once(handler)
    }

    /// Queues an occurrence carrying `args`. No handler runs until the queue is drained.
    pub fn trigger(&self, args: A) {
        let event = Rc::downgrade(&self.event);
        self.queue.push(move || {
            if let Some(event) = event.upgrade() {
                event.trigger(args);
            }
        });
        trace!(event = std::any::type_name::<A>(), pending = self.queue.len(), "Event deferred");
    }

    /// Runs the oldest queued occurrence. Returns `true` while more remain.
    pub fn run_deferred(&self) -> bool {
        self.queue.run_one()
    }

    /// Runs queued occurrences until the queue is empty.
    pub fn run_all_deferred(&self) -> usize {
        self.queue.run_all()
    }

    /// Drops all queued occurrences without running them.
    ///
    /// On a shared queue this discards the occurrences of every event using it.
    pub fn clear_deferred(&self) -> usize {
        self.queue.clear()
    }

    /// Number of queued occurrences (of all events sharing the queue).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Removes the handler behind `handle`.
    pub fn remove(&self, handle: Handle) -> bool {
        self.event.remove(handle)
    }

    /// Removes all handlers without invoking them. Queued occurrences stay queued.
    pub fn remove_all(&self) -> usize {
        self.event.remove_all()
    }

    #[must_use]
    pub fn has_handlers(&self) -> bool {
        self.event.has_handlers()
    }

    #[must_use]
    pub fn count_handlers(&self) -> usize {
        self.event.count_handlers()
    }
}
