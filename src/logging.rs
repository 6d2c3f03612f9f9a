//! Structured logging is consumed through a trait, never a concrete sink.
//!
//! The bus never decides where diagnostics go; it hands key-value pairs to a
//! [`StructuredLogger`]. [`TracingLogger`] is the default implementation,
//! forwarding to the `tracing` crate so a [`crate::processor::Processor`]
//! built with no explicit logger still produces structured events.

/// A single structured key-value pair attached to a log event.
pub type Field<'a> = (&'a str, &'a str);

/// Structured logging sink consumed by the bus.
///
/// Implement this to route bus diagnostics into an application's own logging
/// stack; the bus itself never assumes a concrete backend.
pub trait StructuredLogger: Send + Sync {
    fn info(&self, message: &str, fields: &[Field]);
    fn warn(&self, message: &str, fields: &[Field]);
    fn error(&self, message: &str, fields: &[Field]);
}

/// Default [`StructuredLogger`] backed by the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl StructuredLogger for TracingLogger {
    fn info(&self, message: &str, fields: &[Field]) {
        tracing::info!(fields = ?fields, "{message}");
    }

    fn warn(&self, message: &str, fields: &[Field]) {
        tracing::warn!(fields = ?fields, "{message}");
    }

    fn error(&self, message: &str, fields: &[Field]) {
        tracing::error!(fields = ?fields, "{message}");
    }
}
