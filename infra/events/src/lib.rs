//! # Events
//!
//! An in-process event dispatch core: components register handlers on typed
//! event channels, producers trigger them synchronously, through a deferred
//! queue, or across threads.
//!
//! ## Overview
//!
//! * [`Event`]: single-owner channel. Handlers run inline, in registration
//!   order, and may add or remove handlers (themselves included) while the
//!   event is dispatching.
//! * [`DeferredEvent`]: queues each trigger on a [`DeferredQueue`]; the owner
//!   decides when handlers run.
//! * [`ThreadedEvent`]: lock-guarded channel shared across threads, with
//!   blocking waits, [`OnceFuture`]s, handlers offloaded to an [`Executor`] and
//!   a cross-thread deferred mailbox.
//!
//! Every registration returns a [`Handle`]. Handles are generation-checked
//! slot indices: removing with a stale handle, or a handle issued by another
//! event, does nothing.
//!
//! Named channels are plain fields:
//!
//! ```rust
//! use herald_events::Event;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! #[derive(Default)]
//! struct Widget {
//!     resized: Event<(u32, u32)>,
//!     closed: Event<()>,
//! }
//!
//! let widget = Widget::default();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let sink = Rc::clone(&log);
//! widget.resized.on(move |(w, h)| sink.borrow_mut().push(format!("resized {w}x{h}")));
//! let sink = Rc::clone(&log);
//! widget.closed.once(move |()| sink.borrow_mut().push("closed".to_owned()));
//!
//! widget.resized.trigger((640, 480));
//! widget.closed.trigger(());
//! widget.closed.trigger(());
//!
//! assert_eq!(*log.borrow(), ["resized 640x480", "closed"]);
//! ```

mod deferred;
mod error;
mod event;
mod executor;
mod future;
mod registry;
mod threaded;

pub use deferred::{DeferredEvent, DeferredQueue};
pub use error::{EventError, EventErrorExt, Result};
pub use event::Event;
pub use executor::{Executor, Job, ThreadExecutor};
pub use future::OnceFuture;
pub use herald_runtime::WorkerPool;
pub use registry::Handle;
pub use threaded::{ThreadedEvent, ThreadedEventBuilder};
