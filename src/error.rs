//! Error taxonomy for the command bus.
//!
//! Every failure mode the bus can produce is a distinct, matchable
//! [`BusError`] variant. `Display` renders the literal substrings the
//! testable properties in the design notes key off ("panicked", "timeout",
//! "failed after", "already registered") so callers that only inspect the
//! rendered message (logs, assertions) still observe the right shape.

use std::time::Duration;

/// The error type returned by every public operation on the bus.
#[derive(thiserror::Error, Debug)]
pub enum BusError {
    /// No handler is registered for the derived command name.
    #[error("handler not found for command {0:?}")]
    HandlerNotFound(String),

    /// `Processor::register` was called twice for the same command name.
    #[error("handler for {0:?} already registered")]
    DuplicateHandler(String),

    /// The channel transport's bounded queue was at capacity.
    #[error("buffer full dispatching {0:?}")]
    BufferFull(String),

    /// The runtime payload did not match the type a handler was built for.
    #[error("invalid payload for handler {handler:?}: expected {expected}")]
    InvalidPayload {
        handler: String,
        expected: &'static str,
    },

    /// A handler invocation panicked; the panic was recovered at the
    /// invocation boundary and converted into this error.
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    /// The `timeout` decorator's bound elapsed before the handler returned.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The `retry`/`backoff` decorator exhausted its attempt budget.
    #[error("failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<BusError>,
    },

    /// `Processor::run` was called while already started or draining.
    #[error("processor already started")]
    AlreadyStarted,

    /// `Processor::stop` (or an implicit stop) was called before `run`.
    #[error("processor not started")]
    NotStarted,

    /// Graceful shutdown did not complete within `ShutdownTimeout`.
    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeoutExceeded(Duration),

    /// The channel transport was closed; a second `close` or a dispatch
    /// arriving after `close` observes this instead of silently succeeding.
    #[error("transport already closed")]
    TransportClosed,

    /// The dispatch-time context was already canceled.
    #[error("context cancelled")]
    Cancelled,

    /// The dispatch-time context's deadline had already elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Escape hatch for embedder-supplied errors (handler bodies, error
    /// handler callbacks) that don't map onto a bus-specific kind.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BusError {
    /// True for the context-error variants, mirroring "propagated verbatim
    /// from the caller's context" in the design notes.
    pub fn is_context_error(&self) -> bool {
        matches!(self, BusError::Cancelled | BusError::DeadlineExceeded)
    }
}
