//! Synchronous direct-call transport: no queue, no workers.

use std::any::Any;
use std::sync::Mutex;

use crate::context::Context;
use crate::error::BusError;
use crate::handler::safe_invoke;

use super::{EnvelopeReceiver, HandlerLookup, Transport};

/// Looks the handler up and invokes it inline, on the dispatching thread.
/// `subscribe` always returns the nil-stream sentinel: a Processor built on
/// this transport never spawns workers and simply blocks on its run context.
pub struct SyncTransport {
    lookup: Mutex<Option<HandlerLookup>>,
}

impl SyncTransport {
    pub fn new() -> Self {
        SyncTransport {
            lookup: Mutex::new(None),
        }
    }
}

impl Default for SyncTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SyncTransport {
    fn bind_lookup(&self, lookup: HandlerLookup) {
        *self.lookup.lock().unwrap_or_else(|e| e.into_inner()) = Some(lookup);
    }

    fn dispatch(&self, ctx: Context, name: &str, payload: Box<dyn Any + Send>) -> Result<(), BusError> {
        let guard = self.lookup.lock().unwrap_or_else(|e| e.into_inner());
        let lookup = guard
            .as_ref()
            .expect("SyncTransport dispatched before bind_lookup");
        match lookup(name) {
            Some(handler) => safe_invoke(&handler, ctx, payload),
            None => Err(BusError::HandlerNotFound(name.to_string())),
        }
    }

    fn subscribe(&self, _ctx: &Context) -> Option<EnvelopeReceiver> {
        None
    }

    fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}
