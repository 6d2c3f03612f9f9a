//! Dispatch-time context: cancellation plus an optional deadline.
//!
//! Rust has no built-in equivalent of Go's `context.Context`; this is the
//! minimal concrete vehicle the rest of the bus threads through every
//! operation. A `Context` is a cheap handle (an `Arc` around shared state) so
//! cloning it for an envelope or a retry attempt is free.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// The wait/notify primitive, shared by a context and every descendant
/// derived from it via [`Context::with_timeout`], so canceling any node in
/// the lineage wakes every waiter anywhere in it.
struct Signal {
    notify: Mutex<()>,
    condvar: Condvar,
}

impl Signal {
    fn new() -> Arc<Self> {
        Arc::new(Signal {
            notify: Mutex::new(()),
            condvar: Condvar::new(),
        })
    }

    fn notify_all(&self) {
        let _guard = self.notify.lock().unwrap_or_else(|e| e.into_inner());
        self.condvar.notify_all();
    }

    fn wait(&self, timeout: Duration) {
        let guard = self.notify.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self.condvar.wait_timeout(guard, timeout);
    }
}

struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    signal: Arc<Signal>,
    /// The context this one was derived from, if any. Walked by
    /// [`Inner::effective_state`] so canceling an ancestor is observed by
    /// every descendant without the descendant polling it explicitly.
    parent: Option<Arc<Inner>>,
}

impl Inner {
    /// `Some(error)` if this node or any ancestor is canceled or past its
    /// deadline; `None` if the whole lineage is still live. Checked nearest
    /// node first so a context's own cancellation/deadline takes precedence
    /// over an ancestor's for the returned error kind.
    fn effective_state(&self) -> Option<crate::error::BusError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Some(crate::error::BusError::Cancelled);
        }
        if matches!(self.deadline, Some(d) if Instant::now() >= d) {
            return Some(crate::error::BusError::DeadlineExceeded);
        }
        self.parent.as_ref().and_then(|p| p.effective_state())
    }
}

/// A cancellable, optionally-deadlined handle carried from dispatch through
/// to the handler invocation.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Context {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
                signal: Signal::new(),
                parent: None,
            }),
        }
    }

    /// Derive a child bounded by `timeout`, or by the parent's deadline if
    /// that is sooner. Canceling the parent (at any point afterwards, not
    /// just a snapshot taken at derivation time) cancels the child, since
    /// the child keeps a live link back to the parent's state and shares
    /// its wake signal.
    pub fn with_timeout(parent: &Context, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match parent.deadline() {
            Some(parent_deadline) if parent_deadline < candidate => parent_deadline,
            _ => candidate,
        };
        Context {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
                signal: parent.inner.signal.clone(),
                parent: Some(parent.inner.clone()),
            }),
        }
    }

    /// Mark this context (and anything waiting on it, including every
    /// descendant derived from it) canceled.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.effective_state().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Sleep up to `dur`, waking early if the context (or an ancestor it was
    /// derived from) is canceled. Returns `true` if the sleep ran to
    /// completion, `false` if it was interrupted by cancellation.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            self.inner.signal.wait(deadline - now);
            if Instant::now() >= deadline && !self.is_cancelled() {
                return true;
            }
        }
    }

    /// Block the calling thread until this context (or an ancestor) is
    /// canceled, or its own deadline elapses. Used by
    /// [`crate::processor::Processor::run`] for the synchronous-transport
    /// case, where there is no envelope stream to wait on.
    pub fn block_until_cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let wait_for = match self.inner.deadline {
                Some(d) => d
                    .saturating_duration_since(Instant::now())
                    .max(Duration::from_millis(1)),
                None => Duration::from_secs(3600),
            };
            self.inner.signal.wait(wait_for);
        }
    }

    /// `Ok(())` if this context and every ancestor it was derived from is
    /// still live, the context error otherwise.
    pub fn check(&self) -> Result<(), crate::error::BusError> {
        match self.inner.effective_state() {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
