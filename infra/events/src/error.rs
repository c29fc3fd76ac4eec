use std::borrow::Cow;

/// Result alias for fallible event operations.
pub type Result<T, E = EventError> = std::result::Result<T, E>;

/// Errors that can occur around asynchronous event delivery.
///
/// Synchronous dispatch never fails: unknown handles and timeouts are reported
/// through plain return values.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The sender feeding a [`OnceFuture`](crate::OnceFuture) was dropped before
    /// the event fired, usually because the event itself was dropped.
    #[error("Event abandoned before it fired{}", format_context(.context))]
    Abandoned { context: Option<Cow<'static, str>> },

    /// The executor could not start an asynchronous job.
    #[error("Failed to spawn job{}: {source}", format_context(.context))]
    Spawn {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },
}

impl From<std::io::Error> for EventError {
    fn from(source: std::io::Error) -> Self {
        Self::Spawn { source, context: None }
    }
}

/// Attaches human-readable context to event errors.
pub trait EventErrorExt<T> {
    /// Wraps the error with `context`, replacing any previous context.
    ///
    /// # Errors
    /// Returns the original error, now carrying `context`.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T>;
}

impl<T> EventErrorExt<T> for Result<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut error| {
            match &mut error {
                EventError::Abandoned { context: slot } | EventError::Spawn { context: slot, .. } => {
                    *slot = Some(context.into());
                },
            }
            error
        })
    }
}

impl<T> EventErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T> {
        self.map_err(|source| EventError::Spawn { source, context: Some(context.into()) })
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
