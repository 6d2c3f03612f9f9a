//! Middleware: shared, construction-time wrappers applied to every handler.
//!
//! A middleware maps a [`Handler`] to a `Handler`. Given `[M1, M2, ..., Mn]`,
//! the effective handler is `M1(M2(...Mn(H)...))`: M1 runs first on entry,
//! last on exit. The chain is resolved at lookup time from an immutable,
//! construction-time list, so every dispatch shares the same composition
//! without a mutation path on the hot path.

use std::sync::Arc;
use std::time::Instant;

use crate::handler::Handler;
use crate::logging::{StructuredLogger, TracingLogger};

/// A function mapping handler to handler, applied to every registered
/// handler via the Processor's shared chain.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: Handler) -> Handler;
}

/// Compose `middlewares` around `handler` as `M1(M2(...Mn(handler)...))`.
pub fn chain(middlewares: &[Arc<dyn Middleware>], handler: Handler) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |acc, mw| mw.wrap(acc))
}

/// The one built-in middleware: logs `{command, "started"}` on entry and
/// `{command, duration, error?}` on exit. Never swallows the inner error.
pub struct LoggingMiddleware {
    logger: Arc<dyn StructuredLogger>,
}

impl LoggingMiddleware {
    pub fn new(logger: Arc<dyn StructuredLogger>) -> Self {
        LoggingMiddleware { logger }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        LoggingMiddleware::new(Arc::new(TracingLogger))
    }
}

impl Middleware for LoggingMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        let logger = self.logger.clone();
        let command = next.name().to_string();
        let meta = next.clone();
        let invoke: crate::handler::BoxedInvoke = Arc::new(move |ctx, payload| {
            logger.info("started", &[("command", command.as_str())]);
            let start = Instant::now();
            let result = next.call(ctx, payload);
            let elapsed = format!("{:?}", start.elapsed());
            match &result {
                Ok(()) => logger.info(
                    "finished",
                    &[("command", command.as_str()), ("duration", elapsed.as_str())],
                ),
                Err(e) => {
                    let err = e.to_string();
                    logger.error(
                        "finished",
                        &[
                            ("command", command.as_str()),
                            ("duration", elapsed.as_str()),
                            ("error", err.as_str()),
                        ],
                    );
                }
            }
            result
        });
        Handler::wrapping(&meta, invoke)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::BusError;
    use crate::handler::safe_invoke;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Cmd;

    struct RecordingMiddleware {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for RecordingMiddleware {
        fn wrap(&self, next: Handler) -> Handler {
            let log_before = self.log.clone();
            let log_after = self.log.clone();
            let tag = self.tag;
            let invoke: crate::handler::BoxedInvoke = Arc::new(move |ctx, payload| {
                log_before.lock().unwrap().push(format!("b{tag}"));
                let result = next.call(ctx, payload);
                log_after.lock().unwrap().push(format!("a{tag}"));
                result
            });
            let name = "recording";
            let wrapped = Handler::named::<Cmd, _>(name, |_c, _p: Cmd| Ok(()));
            Handler::wrapping(&wrapped, invoke)
        }
    }

    #[test]
    fn chain_runs_outer_to_inner_then_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let m1: Arc<dyn Middleware> = Arc::new(RecordingMiddleware {
            tag: "1",
            log: log.clone(),
        });
        let m2: Arc<dyn Middleware> = Arc::new(RecordingMiddleware {
            tag: "2",
            log: log.clone(),
        });
        let log_handler = log.clone();
        let handler = Handler::new::<Cmd, _>(move |_ctx, _payload: Cmd| {
            log_handler.lock().unwrap().push("h".to_string());
            Ok(())
        });
        let effective = chain(&[m1, m2], handler);
        let result = safe_invoke(&effective, Context::background(), Box::new(Cmd));
        assert!(result.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["b1", "b2", "h", "a2", "a1"]);
    }

    #[test]
    fn logging_middleware_never_swallows_errors() {
        let handler = Handler::new::<Cmd, _>(|_ctx, _payload: Cmd| {
            Err(BusError::Other(anyhow::anyhow!("boom")))
        });
        let mw: Arc<dyn Middleware> = Arc::new(LoggingMiddleware::default());
        let effective = chain(&[mw], handler);
        let result = safe_invoke(&effective, Context::background(), Box::new(Cmd));
        assert!(result.is_err());
    }
}
