use crate::error::{EventError, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// One-shot result resolved with the arguments of an event's next trigger.
///
/// Created by [`ThreadedEvent::future_once`](crate::ThreadedEvent::future_once).
/// Await it from async code, or block on it with [`OnceFuture::get`].
#[must_use = "a OnceFuture does nothing unless awaited or resolved"]
pub struct OnceFuture<A> {
    receiver: oneshot::Receiver<A>,
}

impl<A> fmt::Debug for OnceFuture<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceFuture").field("event", &std::any::type_name::<A>()).finish()
    }
}

impl<A> OnceFuture<A> {
    pub(crate) fn channel() -> (oneshot::Sender<A>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Blocks the current thread until the event fires.
    ///
    /// # Errors
    /// Returns [`EventError::Abandoned`] if the event was dropped first.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context; await
    /// the future there instead.
    pub fn get(self) -> Result<A> {
        self.receiver.blocking_recv().map_err(|_| abandoned())
    }

    /// Returns the arguments if the event already fired, without blocking.
    ///
    /// # Errors
    /// Returns [`EventError::Abandoned`] if the event was dropped first.
    pub fn try_get(&mut self) -> Result<Option<A>> {
        match self.receiver.try_recv() {
            Ok(args) => Ok(Some(args)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(abandoned()),
        }
    }
}

impl<A> Future for OnceFuture<A> {
    type Output = Result<A>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| result.map_err(|_| abandoned()))
    }
}

const fn abandoned() -> EventError {
    EventError::Abandoned { context: None }
}
