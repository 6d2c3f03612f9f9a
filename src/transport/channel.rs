//! Bounded asynchronous channel transport.
//!
//! Grounded in the handler worker pool's queue-depth tracking: `may`'s
//! `mpsc::channel` is itself unbounded, so capacity is enforced with an
//! atomic depth counter checked before every non-blocking send, the same
//! shape the worker pool uses for its block/shed backpressure modes.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use may::sync::mpsc;

use crate::context::Context;
use crate::envelope::Envelope;
use crate::error::BusError;

use super::{EnvelopeReceiver, HandlerLookup, Transport};

pub struct ChannelTransport {
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,
    receiver: Arc<mpsc::Receiver<Envelope>>,
    depth: Arc<AtomicUsize>,
    closed: AtomicBool,
    lookup: Mutex<Option<HandlerLookup>>,
}

impl ChannelTransport {
    /// Build a channel transport with a bounded queue of `capacity`.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ChannelTransport capacity must be >= 1");
        let (tx, rx) = mpsc::channel::<Envelope>();
        ChannelTransport {
            capacity,
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(rx),
            depth: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            lookup: Mutex::new(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current approximate queue depth.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl Transport for ChannelTransport {
    fn bind_lookup(&self, lookup: HandlerLookup) {
        *self.lookup.lock().unwrap_or_else(|e| e.into_inner()) = Some(lookup);
    }

    fn dispatch(&self, ctx: Context, name: &str, payload: Box<dyn Any + Send>) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::TransportClosed);
        }
        {
            let guard = self.lookup.lock().unwrap_or_else(|e| e.into_inner());
            let lookup = guard
                .as_ref()
                .expect("ChannelTransport dispatched before bind_lookup");
            if lookup(name).is_none() {
                return Err(BusError::HandlerNotFound(name.to_string()));
            }
        }
        ctx.check()?;

        // Reserve a slot before sending so concurrent dispatchers racing for
        // the last slot observe BufferFull instead of overrunning capacity.
        loop {
            let current = self.depth.load(Ordering::SeqCst);
            if current >= self.capacity {
                return Err(BusError::BufferFull(name.to_string()));
            }
            if self
                .depth
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        // The envelope's completion token holds the reservation above until
        // the handler finishes (or, on these early-exit paths, until the
        // envelope itself is dropped here).
        let envelope = Envelope::new(name, payload, ctx.clone(), self.depth.clone());
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(sender) => match sender.send(envelope) {
                Ok(()) => Ok(()),
                Err(_) => Err(BusError::TransportClosed),
            },
            None => Err(BusError::TransportClosed),
        }
    }

    fn subscribe(&self, _ctx: &Context) -> Option<EnvelopeReceiver> {
        Some(EnvelopeReceiver::new(self.receiver.clone()))
    }

    fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(BusError::TransportClosed);
        }
        // Dropping the sender is what makes pending `recv`s on the shared
        // receiver return `Err` once the queue drains.
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}
