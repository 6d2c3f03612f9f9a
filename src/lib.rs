//! # commandbus
//!
//! A type-safe, pluggable-transport, in-process command bus: a stateless
//! [`Dispatcher`] (client) and an active [`Processor`] (router/worker
//! manager), connected by a passive [`Transport`] (wire).
//!
//! ## Architecture
//!
//! - **[`command`]** — derives a stable dispatch name from a command
//!   value's type.
//! - **[`handler`]** — wraps a typed function into a name-tagged handler
//!   with panic-safe invocation.
//! - **[`middleware`]** — the Processor's shared, construction-time
//!   wrapper chain.
//! - **[`decorator`]** — per-handler retry/backoff/timeout wrappers applied
//!   at registration time.
//! - **[`transport`]** — the wire between Dispatcher and Processor: a
//!   synchronous direct call ([`transport::SyncTransport`]) or a bounded
//!   async channel ([`transport::ChannelTransport`]).
//! - **[`dispatcher`]** — the stateless client surface.
//! - **[`processor`]** — the active owner of handlers, workers, and
//!   lifecycle.
//! - **[`context`]** — the cancellable, optionally-deadlined handle
//!   threaded through every dispatch.
//! - **[`error`]** — the [`error::BusError`] taxonomy every public
//!   operation returns.
//!
//! ## Quick start
//!
//! ```
//! use commandbus::context::Context;
//! use commandbus::dispatcher::Dispatcher;
//! use commandbus::handler::Handler;
//! use commandbus::processor::{Processor, ProcessorOptions};
//! use commandbus::transport::{SyncTransport, Transport};
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct CreateUser {
//!     email: String,
//! }
//!
//! let transport: Arc<dyn Transport> = Arc::new(SyncTransport::new());
//! let processor = Processor::new(transport.clone(), ProcessorOptions::default());
//! processor.register(Handler::new::<CreateUser, _>(|_ctx, cmd| {
//!     println!("creating {}", cmd.email);
//!     Ok(())
//! }));
//!
//! let dispatcher = Dispatcher::new(transport);
//! dispatcher
//!     .dispatch(Context::background(), CreateUser { email: "u@e".into() })
//!     .unwrap();
//! assert_eq!(processor.stats().processed, 1);
//! ```
//!
//! ## Runtime considerations
//!
//! The channel transport's worker pool is built on the `may` coroutine
//! runtime, not tokio or async-std: workers are `may` coroutines sharing one
//! receiver, and waits (backoff, timeout, shutdown-drain) use `may`-friendly
//! blocking primitives rather than an async executor. A synchronous
//! transport never touches `may` at all — the handler runs on the
//! dispatching thread.
//!
//! ## Non-goals
//!
//! Persistent queues, cross-process delivery, exactly-once delivery
//! guarantees, retry-after-restart, and a distributed tracing
//! implementation are out of scope; the bus only propagates a
//! [`context::Context`] an embedder can attach spans to. Authorization is
//! likewise the embedder's concern.

pub mod command;
pub mod context;
pub mod decorator;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod processor;
pub mod runtime_config;
pub mod transport;

pub use command::command_name;
pub use context::Context;
pub use decorator::{backoff, retry, timeout};
pub use dispatcher::Dispatcher;
pub use error::BusError;
pub use handler::Handler;
pub use logging::{StructuredLogger, TracingLogger};
pub use middleware::{LoggingMiddleware, Middleware};
pub use processor::{Processor, ProcessorBuilder, ProcessorOptions, Stats};
pub use transport::{ChannelTransport, SyncTransport, Transport};
