//! Per-handler decorators: retry, backoff, and timeout.
//!
//! Decorators wrap a single [`Handler`] and are applied by the caller before
//! registration — they are inner wrappers, distinct from the Processor's
//! shared, construction-time [`crate::middleware::Middleware`] chain.

use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use crate::context::Context;
use crate::error::BusError;
use crate::handler::{safe_invoke, BoxedInvoke, Handler};

/// Attempt `handler` up to `max_retries + 1` times. Retries unless the
/// context is already canceled, in which case the context error is returned
/// immediately. Exhausting all attempts yields
/// [`BusError::RetriesExhausted`] wrapping the last underlying error.
pub fn retry(handler: Handler, max_retries: usize) -> Handler {
    let inner = Arc::new(handler.clone());
    let total_attempts = max_retries + 1;
    let invoke: BoxedInvoke = Arc::new(move |ctx: Context, payload: Box<dyn std::any::Any + Send>| {
        let mut last_err: Option<BusError> = None;
        for attempt in 0..total_attempts {
            if let Err(e) = ctx.check() {
                return Err(e);
            }
            let attempt_payload = inner.clone_payload(payload.as_ref());
            match safe_invoke(&inner, ctx.clone(), attempt_payload) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(BusError::RetriesExhausted {
            attempts: total_attempts,
            source: Box::new(last_err.expect("loop runs at least once since max_retries + 1 >= 1")),
        })
    });
    Handler::wrapping(&handler, invoke)
}

/// Like [`retry`], but waits between attempts. The delay starts at
/// `initial_delay` and doubles each retry, capped at `max_delay`. The wait is
/// cancelable: if the context is canceled mid-wait, the context error is
/// returned immediately instead of retrying.
pub fn backoff(handler: Handler, max_retries: usize, initial_delay: Duration, max_delay: Duration) -> Handler {
    let inner = Arc::new(handler.clone());
    let total_attempts = max_retries + 1;
    let invoke: BoxedInvoke = Arc::new(move |ctx: Context, payload: Box<dyn std::any::Any + Send>| {
        let mut last_err: Option<BusError> = None;
        let mut delay = initial_delay;
        for attempt in 0..total_attempts {
            if let Err(e) = ctx.check() {
                return Err(e);
            }
            if attempt > 0 {
                if !ctx.sleep(delay) {
                    return Err(ctx.check().err().unwrap_or(BusError::Cancelled));
                }
                delay = std::cmp::min(delay * 2, max_delay);
            }
            let attempt_payload = inner.clone_payload(payload.as_ref());
            match safe_invoke(&inner, ctx.clone(), attempt_payload) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(BusError::RetriesExhausted {
            attempts: total_attempts,
            source: Box::new(last_err.expect("loop runs at least once since max_retries + 1 >= 1")),
        })
    });
    Handler::wrapping(&handler, invoke)
}

/// Bound `handler`'s execution to `duration`. If the bound elapses before
/// the handler returns, the result is [`BusError::Timeout`] and in-flight
/// work is abandoned (not awaited) rather than blocking the caller past the
/// bound — the handler runs to completion on its own thread regardless.
pub fn timeout(handler: Handler, duration: Duration) -> Handler {
    let inner = Arc::new(handler.clone());
    let invoke: BoxedInvoke = Arc::new(move |ctx: Context, payload: Box<dyn std::any::Any + Send>| {
        let bounded_ctx = Context::with_timeout(&ctx, duration);
        let (tx, rx) = std_mpsc::channel();
        let inner = inner.clone();
        let worker_ctx = bounded_ctx.clone();
        let spawned = std::thread::Builder::new().spawn(move || {
            let result = safe_invoke(&inner, worker_ctx, payload);
            let _ = tx.send(result);
        });
        if spawned.is_err() {
            return Err(BusError::Timeout(duration));
        }
        match rx.recv_timeout(duration) {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout(duration)),
        }
    });
    Handler::wrapping(&handler, invoke)
}
