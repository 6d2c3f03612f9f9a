//! The internal unit of work carried across asynchronous transports.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::Context;

/// Releases one reservation against a [`crate::transport::ChannelTransport`]'s
/// bounded capacity when dropped.
///
/// The reservation is held from the moment an envelope is enqueued until its
/// handler has actually finished running, not merely until a worker dequeues
/// it — a slow in-flight handler still occupies a capacity slot, matching
/// the design notes' "C+k concurrent enqueues, exactly C succeed" invariant
/// even with a single worker draining the queue.
pub(crate) struct CompletionToken {
    depth: Arc<AtomicUsize>,
}

impl CompletionToken {
    pub(crate) fn new(depth: Arc<AtomicUsize>) -> Self {
        CompletionToken { depth }
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A command in flight: its dispatch name, its original (not re-serialized)
/// payload, and the context captured at enqueue time.
///
/// Only asynchronous transports need this — a sync transport invokes the
/// handler inline and never constructs one.
pub struct Envelope {
    name: String,
    payload: Box<dyn Any + Send>,
    ctx: Context,
    completion: CompletionToken,
}

impl Envelope {
    pub(crate) fn new(
        name: impl Into<String>,
        payload: Box<dyn Any + Send>,
        ctx: Context,
        depth: Arc<AtomicUsize>,
    ) -> Self {
        Envelope {
            name: name.into(),
            payload,
            ctx,
            completion: CompletionToken::new(depth),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// Consume the envelope, returning its name, payload, context, and the
    /// capacity reservation token. Keep the token alive until the handler
    /// has finished running, then let it drop (or drop it explicitly) to
    /// release the slot.
    pub(crate) fn into_parts(self) -> (String, Box<dyn Any + Send>, Context, CompletionToken) {
        let Envelope {
            name,
            payload,
            ctx,
            completion,
        } = self;
        (name, payload, ctx, completion)
    }
}
