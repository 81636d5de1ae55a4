use std::time::Duration;

use flint_query::RenderError;

use crate::driver::{BoxError, Deadline, DriverError};
use crate::hooks::HookPhase;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{phase} hook failed: {source}")]
    Hook {
        phase: HookPhase,
        #[source]
        source: BoxError,
    },

    #[error("store error: {0}")]
    Store(#[source] DriverError),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("stream callback failed: {0}")]
    Stream(BoxError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("invalid cursor token: {0}")]
    InvalidCursor(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Map a driver failure, turning an expired deadline into a timeout.
    pub(crate) fn from_driver(e: DriverError, deadline: &Deadline) -> Self {
        match e {
            DriverError::DeadlineExceeded => Error::Timeout(deadline.budget()),
            other => Error::Store(other),
        }
    }

    /// Map a callback failure. Errors the builder itself handed to the
    /// callback (a timeout while reading rows, say) come back unchanged.
    pub(crate) fn from_callback(e: BoxError) -> Self {
        match e.downcast::<Error>() {
            Ok(inner) => *inner,
            Err(other) => Error::Stream(other),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
