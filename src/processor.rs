//! The Processor: active owner of the handler table, middleware, worker
//! pool, and lifecycle.
//!
//! Registration must happen in the `New` state, before [`Processor::run`].
//! `run` blocks the calling thread until its context is canceled, then
//! drains and returns — the same state machine this codebase's worker pool
//! uses for its handler coroutines, generalized to a cancel-driven shutdown
//! instead of a channel-drop one.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::command::command_name;
use crate::context::Context;
use crate::error::BusError;
use crate::handler::{safe_invoke, Handler};
use crate::logging::{StructuredLogger, TracingLogger};
use crate::middleware::{self, Middleware};
use crate::runtime_config::RuntimeConfig;
use crate::transport::Transport;

/// Invoked on every async failure (including recovered panics) with the
/// dispatch-time context, the command name, and the error.
pub type ErrorHandler = Arc<dyn Fn(Context, &str, &BusError) + Send + Sync>;

/// A point-in-time snapshot of the Processor's monotonic counters. No
/// transactional consistency is guaranteed between the three fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub received: u64,
    pub processed: u64,
    pub failed: u64,
}

/// Construction-time options for a [`Processor`].
///
/// `Default` reads [`RuntimeConfig::from_env`] for `workers` and
/// `shutdown_timeout` so a Processor built with no explicit options still
/// honors `COMMANDBUS_DEFAULT_WORKERS` / `COMMANDBUS_SHUTDOWN_TIMEOUT_MS`.
#[derive(Clone)]
pub struct ProcessorOptions {
    pub workers: usize,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub error_handler: Option<ErrorHandler>,
    pub logger: Arc<dyn StructuredLogger>,
    pub shutdown_timeout: Duration,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        let config = RuntimeConfig::from_env();
        ProcessorOptions {
            workers: config.default_workers,
            middleware: Vec::new(),
            error_handler: None,
            logger: Arc::new(TracingLogger),
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// Fluent construction, matching `spec.md`'s `Processor.builder(...)` surface
/// over the same [`ProcessorOptions`] [`Processor::new`] takes directly.
pub struct ProcessorBuilder {
    transport: Arc<dyn Transport>,
    options: ProcessorOptions,
}

impl ProcessorBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.options.workers = n;
        self
    }

    pub fn middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.options.middleware = middleware;
        self
    }

    pub fn error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(Context, &str, &BusError) + Send + Sync + 'static,
    {
        self.options.error_handler = Some(Arc::new(f));
        self
    }

    pub fn logger(mut self, logger: Arc<dyn StructuredLogger>) -> Self {
        self.options.logger = logger;
        self
    }

    pub fn shutdown_timeout(mut self, d: Duration) -> Self {
        self.options.shutdown_timeout = d;
        self
    }

    pub fn build(self) -> Processor {
        Processor::new(self.transport, self.options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Started,
    Draining,
    Stopped,
}

struct Inner {
    handlers: RwLock<HashMap<String, Handler>>,
    middleware: Vec<Arc<dyn Middleware>>,
    logger: Arc<dyn StructuredLogger>,
    error_handler: Option<ErrorHandler>,
    workers: usize,
    shutdown_timeout: Duration,
    received: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    state: Mutex<State>,
}

impl Inner {
    fn effective_handler(&self, name: &str) -> Option<Handler> {
        let guard = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let handler = guard.get(name)?.clone();
        Some(middleware::chain(&self.middleware, handler))
    }
}

/// Owns the handler table, middleware chain, worker pool, and lifecycle for
/// one [`crate::transport::Transport`].
pub struct Processor {
    inner: Arc<Inner>,
    transport: Arc<dyn Transport>,
}

impl Processor {
    /// Build a Processor over `transport`, binding the transport's
    /// handler-lookup callback to this Processor's table immediately.
    pub fn new(transport: Arc<dyn Transport>, options: ProcessorOptions) -> Self {
        let inner = Arc::new(Inner {
            handlers: RwLock::new(HashMap::new()),
            middleware: options.middleware,
            logger: options.logger,
            error_handler: options.error_handler,
            workers: options.workers.max(1),
            shutdown_timeout: options.shutdown_timeout,
            received: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            state: Mutex::new(State::New),
        });
        let lookup_inner = inner.clone();
        transport.bind_lookup(Arc::new(move |name| lookup_inner.effective_handler(name)));
        Processor { inner, transport }
    }

    /// Start building a Processor with a fluent options surface.
    pub fn builder(transport: Arc<dyn Transport>) -> ProcessorBuilder {
        ProcessorBuilder {
            transport,
            options: ProcessorOptions::default(),
        }
    }

    /// Register `handler` under its name.
    ///
    /// # Panics
    /// Panics if a handler is already registered under the same name, or if
    /// the name is empty.
    pub fn register(&self, handler: Handler) {
        assert!(!handler.name().is_empty(), "handler name must not be empty");
        let mut guard = self.inner.handlers.write().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(handler.name()) {
            panic!("handler for {:?} already registered", handler.name());
        }
        guard.insert(handler.name().to_string(), handler);
    }

    /// Forward a typed value to the underlying transport, deriving its
    /// command name the same way [`crate::dispatcher::Dispatcher`] does.
    /// Lets a simple app skip standing up a separate Dispatcher when it
    /// already holds a Processor over a sync transport.
    pub fn dispatch<T: Any + Send + 'static>(&self, ctx: Context, value: T) -> Result<(), BusError> {
        let name = command_name::<T>();
        self.transport.dispatch(ctx, &name, Box::new(value))
    }

    /// Current counter snapshot.
    pub fn stats(&self) -> Stats {
        Stats {
            received: self.inner.received.load(Ordering::Relaxed),
            processed: self.inner.processed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }

    /// Subscribe to the transport and run until `ctx` is canceled.
    ///
    /// Synchronous transports (`subscribe` returns `None`) simply block on
    /// `ctx` and return once canceled. Channel transports spawn
    /// `options.workers` worker coroutines draining the envelope stream;
    /// canceling `ctx` closes the transport and waits (bounded by
    /// `shutdown_timeout`) for every worker to finish draining.
    pub fn run(&self, ctx: Context) -> Result<(), BusError> {
        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                State::Started | State::Draining => return Err(BusError::AlreadyStarted),
                State::New | State::Stopped => *state = State::Started,
            }
        }

        let receiver = self.transport.subscribe(&ctx);
        let Some(receiver) = receiver else {
            self.inner.logger.info("processor started", &[("mode", "sync")]);
            ctx.block_until_cancelled();
            *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = State::Draining;
            let _ = self.transport.close();
            *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = State::Stopped;
            return Ok(());
        };

        self.inner.logger.info(
            "processor started",
            &[("mode", "channel"), ("workers", "spawned")],
        );

        let active_workers = Arc::new(AtomicUsize::new(self.inner.workers));
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        for worker_id in 0..self.inner.workers {
            let inner = self.inner.clone();
            let receiver = receiver.clone();
            let done_tx = done_tx.clone();
            let active_workers = active_workers.clone();
            let spawned = may::coroutine::spawn(move || {
                while let Some(envelope) = receiver.recv() {
                    handle_envelope(&inner, envelope);
                }
                active_workers.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(());
                let _ = worker_id;
            });
            let _ = spawned;
        }
        drop(done_tx);

        ctx.block_until_cancelled();
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = State::Draining;
        let _ = self.transport.close();

        let deadline = Instant::now() + self.inner.shutdown_timeout;
        let mut timed_out = false;
        while active_workers.load(Ordering::SeqCst) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                timed_out = true;
                break;
            }
            if done_rx.recv_timeout(remaining).is_err() {
                timed_out = true;
                break;
            }
        }

        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = State::Stopped;
        if timed_out {
            self.inner.logger.warn(
                "shutdown timed out",
                &[("timeout", &format!("{:?}", self.inner.shutdown_timeout))],
            );
            Err(BusError::ShutdownTimeoutExceeded(self.inner.shutdown_timeout))
        } else {
            Ok(())
        }
    }
}

fn handle_envelope(inner: &Arc<Inner>, envelope: crate::envelope::Envelope) {
    // `_completion` is held for the rest of this function so the transport's
    // capacity slot stays reserved until the handler has actually finished,
    // not merely until this worker dequeued the envelope.
    let (name, payload, ctx, _completion) = envelope.into_parts();
    let Some(handler) = inner.effective_handler(&name) else {
        inner.failed.fetch_add(1, Ordering::Relaxed);
        inner.logger.error("handler not found", &[("command", name.as_str())]);
        if let Some(cb) = &inner.error_handler {
            cb(ctx, &name, &BusError::HandlerNotFound(name.clone()));
        }
        return;
    };
    inner.received.fetch_add(1, Ordering::Relaxed);
    match safe_invoke(&handler, ctx.clone(), payload) {
        Ok(()) => {
            inner.processed.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            inner.failed.fetch_add(1, Ordering::Relaxed);
            if let Some(cb) = &inner.error_handler {
                cb(ctx, &name, &e);
            }
        }
    }
}
