//! Handler abstraction: wrapping a typed function into a name-tagged,
//! payload-typed handler with panic-safe invocation.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::command::command_name;
use crate::context::Context;
use crate::error::BusError;

pub(crate) type BoxedInvoke =
    Arc<dyn Fn(Context, Box<dyn Any + Send>) -> Result<(), BusError> + Send + Sync>;
pub(crate) type BoxedClone = Arc<dyn Fn(&(dyn Any + Send)) -> Box<dyn Any + Send> + Send + Sync>;

/// A single command handler: a name plus an invocation operation.
///
/// Created with [`Handler::new`] or [`Handler::named`], registered into
/// exactly one [`crate::processor::Processor`], read-only thereafter.
///
/// Command payload types must be `Clone`: the `retry`/`backoff` decorators
/// and the channel transport (which hands the same envelope to middleware
/// `before`/`after` hooks) need to replay or re-observe the payload.
#[derive(Clone)]
pub struct Handler {
    name: String,
    expected_type: &'static str,
    invoke: BoxedInvoke,
    clone_payload: BoxedClone,
}

impl Handler {
    /// Derive the command name from `T` and wrap `f` into a [`Handler`].
    ///
    /// The runtime payload is asserted to be exactly `T`; a mismatch fails
    /// with [`BusError::InvalidPayload`] rather than calling `f`.
    pub fn new<T, F>(f: F) -> Self
    where
        T: Clone + Send + 'static,
        F: Fn(Context, T) -> Result<(), BusError> + Send + Sync + 'static,
    {
        Self::named(command_name::<T>(), f)
    }

    /// Like [`Handler::new`] but with an explicit name, for disambiguating
    /// two distinct types that share a leaf name.
    pub fn named<T, F>(name: impl Into<String>, f: F) -> Self
    where
        T: Clone + Send + 'static,
        F: Fn(Context, T) -> Result<(), BusError> + Send + Sync + 'static,
    {
        let name = name.into();
        let expected_type = std::any::type_name::<T>();
        let handler_name = name.clone();
        let invoke: BoxedInvoke = Arc::new(move |ctx, payload| {
            let payload = payload.downcast::<T>().map_err(|_| BusError::InvalidPayload {
                handler: handler_name.clone(),
                expected: expected_type,
            })?;
            f(ctx, *payload)
        });
        let clone_payload: BoxedClone = Arc::new(|payload| {
            let typed = payload
                .downcast_ref::<T>()
                .expect("clone_payload called with mismatched payload type");
            Box::new(typed.clone())
        });
        Handler {
            name,
            expected_type,
            invoke,
            clone_payload,
        }
    }

    /// Construct a `Handler` wrapping another one's invocation and clone
    /// function, keeping its name/expected type. Used by decorators.
    pub(crate) fn wrapping(inner: &Handler, invoke: BoxedInvoke) -> Self {
        Handler {
            name: inner.name.clone(),
            expected_type: inner.expected_type,
            invoke,
            clone_payload: inner.clone_payload.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected_type(&self) -> &'static str {
        self.expected_type
    }

    /// Invoke the handler directly, without panic recovery. Transports and
    /// decorators should prefer [`safe_invoke`].
    pub fn call(&self, ctx: Context, payload: Box<dyn Any + Send>) -> Result<(), BusError> {
        (self.invoke)(ctx, payload)
    }

    pub(crate) fn clone_payload(&self, payload: &(dyn Any + Send)) -> Box<dyn Any + Send> {
        (self.clone_payload)(payload)
    }
}

/// Invoke `handler` with panic recovery: a panicking handler body becomes
/// [`BusError::HandlerPanicked`] instead of unwinding past this boundary.
///
/// Used by every transport and by the retry/backoff/timeout decorators so a
/// single misbehaving handler invocation can never bring down a worker.
pub fn safe_invoke(
    handler: &Handler,
    ctx: Context,
    payload: Box<dyn Any + Send>,
) -> Result<(), BusError> {
    match catch_unwind(AssertUnwindSafe(|| handler.call(ctx, payload))) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            Err(BusError::HandlerPanicked(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + 'static)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
