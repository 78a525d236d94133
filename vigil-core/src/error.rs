//! Error types shared across the crate.

use thiserror::Error;

/// Errors produced by the reactive engine or raised by user computations.
///
/// User getters and callbacks return [`Result`]; anything they fail with is
/// wrapped in [`Error::User`] via [`Error::user`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A user-supplied getter or callback failed.
    #[error("{0}")]
    User(String),

    /// A deferred callback panicked while the tick queue was flushing.
    #[error("callback panicked: {0}")]
    Panicked(String),

    /// The runtime a handle belongs to has already been dropped.
    #[error("reactive runtime has been dropped")]
    RuntimeReleased,

    /// The owner context a watcher belongs to has already been dropped.
    #[error("owner context has been dropped")]
    OwnerReleased,

    /// The tick queue was dropped before the awaited flush happened.
    #[error("tick queue dropped before the flush ran")]
    TickCancelled,

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a user-facing failure message.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    /// Build an error from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::Panicked(message)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
