//! The wire between a [`crate::dispatcher::Dispatcher`] and a
//! [`crate::processor::Processor`]: passive on both facets, owning only
//! whatever state its variant needs to move an envelope from one side to
//! the other.

mod channel;
mod sync;

pub use channel::ChannelTransport;
pub use sync::SyncTransport;

use std::any::Any;
use std::sync::Arc;

use crate::context::Context;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::handler::Handler;

/// Supplied by the Processor at construction: given a command name, returns
/// the registered handler (already wrapped by the middleware chain), if any.
pub type HandlerLookup = Arc<dyn Fn(&str) -> Option<Handler> + Send + Sync>;

/// A transport's two facets in one trait: dispatcher-facing `dispatch`, and
/// processor-facing `subscribe`/`close`.
pub trait Transport: Send + Sync {
    /// Bind the Processor's handler-lookup function. Called exactly once,
    /// by `Processor::new`, before any dispatch or subscribe.
    fn bind_lookup(&self, lookup: HandlerLookup);

    /// Dispatcher-facing send. Sync transports invoke the handler inline;
    /// channel transports validate registration and enqueue.
    fn dispatch(&self, ctx: Context, name: &str, payload: Box<dyn Any + Send>) -> Result<(), BusError>;

    /// Processor-facing subscription. `None` is the sentinel meaning
    /// "synchronous transport; do not spawn workers".
    fn subscribe(&self, ctx: &Context) -> Option<EnvelopeReceiver>;

    /// Processor-facing shutdown: stop accepting new envelopes and let the
    /// subscription drain. A no-op for sync transports.
    fn close(&self) -> Result<(), BusError>;
}

/// A cloneable handle onto a channel transport's queue. Every worker a
/// Processor spawns clones the same receiver, matching the shared-receiver
/// load-balancing the channel transport uses internally.
///
/// Dequeuing an envelope here does not by itself free capacity — the
/// envelope's completion token (see [`crate::envelope::Envelope::into_parts`])
/// does that when the handler finishes, so a slow in-flight handler still
/// counts against the transport's bound.
#[derive(Clone)]
pub struct EnvelopeReceiver {
    inner: Arc<may::sync::mpsc::Receiver<Envelope>>,
}

impl EnvelopeReceiver {
    pub(crate) fn new(inner: Arc<may::sync::mpsc::Receiver<Envelope>>) -> Self {
        EnvelopeReceiver { inner }
    }

    /// Block for the next envelope. `None` once the sender side has closed
    /// and the queue is drained.
    pub fn recv(&self) -> Option<Envelope> {
        self.inner.recv().ok()
    }
}
