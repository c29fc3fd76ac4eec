use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of process-unique registry ids, so handles never cross events.
static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a single handler registration.
///
/// A handle stays valid until its handler is removed or, for `once`
/// registrations, until it fires. Stale handles, and handles issued by a
/// different event, are rejected by `remove` without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    owner: u64,
    index: usize,
    generation: u32,
}

struct Slot<H> {
    /// Incremented each time the slot is released.
    generation: u32,
    node: Option<Node<H>>,
}

struct Node<H> {
    /// `None` while the handler is executing.
    handler: Option<H>,
    once: bool,
    /// Tombstone written by `remove` when the node is in flight.
    dead: bool,
    seq: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// What a dispatch pass should do with the node under its cursor.
pub(crate) enum Step<H> {
    Run(H),
    Skip(Option<usize>),
    Stop,
}

/// Result of a successful `remove`.
pub(crate) enum Detached<H> {
    /// The node was unlinked; the handler is handed back so the caller can
    /// drop it outside of any registry borrow.
    Unlinked(H),
    /// The node is executing; the walk unlinks it once the handler returns.
    Tombstoned,
}

impl<H> Detached<H> {
    /// Drops the unlinked handler. Call it after the registry borrow is gone.
    pub(crate) fn release(self) {
        if let Self::Unlinked(handler) = self {
            drop(handler);
        }
    }
}

/// Insertion-ordered handler list threaded through a slot arena.
///
/// Nodes are doubly linked so any node can be unlinked in O(1), including the
/// neighbours of a node whose handler is currently running.
pub(crate) struct Registry<H> {
    owner: u64,
    slots: Vec<Slot<H>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    live: usize,
    next_seq: u64,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("owner", &self.owner)
            .field("live", &self.live)
            .field("slots", &self.slots.len())
            .field("free", &self.free.len())
            .finish()
    }
}

impl<H> Registry<H> {
    pub(crate) fn new() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            live: 0,
            next_seq: 0,
        }
    }

    /// Number of live handlers. Tombstoned nodes are not counted.
    pub(crate) const fn len(&self) -> usize {
        self.live
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Appends `handler` at the tail and returns its handle.
    pub(crate) fn insert(&mut self, handler: H, once: bool) -> Handle {
        let seq = self.next_seq;
        self.next_seq += 1;

        let node =
            Node { handler: Some(handler), once, dead: false, seq, prev: self.tail, next: None };

        let index = if let Some(index) = self.free.pop() {
            self.slots[index].node = Some(node);
            index
        } else {
            self.slots.push(Slot { generation: 0, node: Some(node) });
            self.slots.len() - 1
        };

        match self.tail.and_then(|tail| self.node_mut(tail)) {
            Some(tail) => tail.next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.live += 1;

        Handle { owner: self.owner, index, generation: self.slots[index].generation }
    }

    /// Removes the registration behind `handle`.
    ///
    /// Returns `None` for unknown, stale, foreign or already removed handles.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<Detached<H>> {
        if handle.owner != self.owner {
            return None;
        }

        let node = self
            .slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
            .filter(|node| !node.dead)?;

        self.live -= 1;
        if node.handler.is_none() {
            node.dead = true;
            return Some(Detached::Tombstoned);
        }

        self.unlink(handle.index).and_then(|node| node.handler).map(Detached::Unlinked)
    }

    /// Removes every live registration.
    ///
    /// Returns the number of removed handlers together with the unlinked ones;
    /// handlers that are executing right now are tombstoned instead.
    pub(crate) fn clear(&mut self) -> (usize, Vec<H>) {
        let removed = self.live;
        let mut spent = Vec::with_capacity(removed);

        let mut cursor = self.head;
        while let Some(index) = cursor {
            let Some(node) = self.node_mut(index) else { break };
            cursor = node.next;

            if node.handler.is_none() {
                node.dead = true;
                continue;
            }
            if let Some(handler) = self.unlink(index).and_then(|node| node.handler) {
                spent.push(handler);
            }
        }

        self.live = 0;
        (removed, spent)
    }

    /// Takes the handler out of the node at `index` for a pass that started
    /// at sequence `horizon`.
    pub(crate) fn begin(&mut self, index: usize, horizon: u64) -> Step<H> {
        let Some(node) = self.node_mut(index) else { return Step::Stop };
        if node.seq >= horizon {
            return Step::Stop;
        }
        if node.dead {
            return Step::Skip(node.next);
        }
        node.handler.take().map_or(Step::Skip(node.next), Step::Run)
    }

    /// Puts a handler back after it ran, or retires its node if it was a
    /// `once` registration or got tombstoned while running.
    ///
    /// Returns the successor to visit next, plus the handler when the node was
    /// retired.
    pub(crate) fn finish(&mut self, index: usize, handler: H) -> (Option<usize>, Option<H>) {
        let Some(node) = self.node_mut(index) else { return (None, Some(handler)) };
        let next = node.next;

        if node.dead {
            self.unlink(index);
            return (next, Some(handler));
        }
        if node.once {
            self.live -= 1;
            self.unlink(index);
            return (next, Some(handler));
        }

        node.handler = Some(handler);
        (next, None)
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node<H>> {
        self.slots.get_mut(index).and_then(|slot| slot.node.as_mut())
    }

    fn unlink(&mut self, index: usize) -> Option<Node<H>> {
        let node = self.slots.get_mut(index)?.node.take()?;

        match node.prev.and_then(|prev| self.node_mut(prev)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|next| self.node_mut(next)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }

        let slot = &mut self.slots[index];
        // An exhausted slot is retired for good rather than risk a generation clash.
        if let Some(generation) = slot.generation.checked_add(1) {
            slot.generation = generation;
            self.free.push(index);
        }

        Some(node)
    }
}

/// Keeps a running handler out of its node and settles the node afterwards,
/// including while unwinding from a panicking handler.
struct InFlight<'a, H> {
    registry: &'a RefCell<Registry<H>>,
    index: usize,
    handler: Option<H>,
}

impl<H> InFlight<'_, H> {
    fn complete(mut self) -> Option<usize> {
        self.handler.take().and_then(|handler| self.settle(handler))
    }

    fn settle(&self, handler: H) -> Option<usize> {
        let (next, spent) = self.registry.borrow_mut().finish(self.index, handler);
        drop(spent);
        next
    }
}

impl<H> Drop for InFlight<'_, H> {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            self.settle(handler);
        }
    }
}

/// Walks the registry in insertion order and hands every live handler to
/// `visit`. Returns how many handlers ran.
///
/// The registry is never borrowed while `visit` runs, so handlers may
/// register, remove (themselves included) or clear handlers of the same
/// registry. Handlers registered during the pass are not visited by it, and a
/// handler that is already running further up the stack is skipped.
pub(crate) fn dispatch<H>(registry: &RefCell<Registry<H>>, mut visit: impl FnMut(&mut H)) -> usize {
    let (mut cursor, horizon) = {
        let registry = registry.borrow();
        (registry.head, registry.next_seq)
    };

    let mut fired = 0;
    while let Some(index) = cursor {
        let step = registry.borrow_mut().begin(index, horizon);
        cursor = match step {
            Step::Stop => break,
            Step::Skip(next) => next,
            Step::Run(handler) => {
                let mut in_flight = InFlight { registry, index, handler: Some(handler) };
                if let Some(handler) = in_flight.handler.as_mut() {
                    visit(handler);
                }
                fired += 1;
                in_flight.complete()
            },
        };
    }
    fired
}
