//! Injectable diagnostics sink.
//!
//! The builder never reaches for a global logger; it is handed a [`Logger`]
//! at construction. [`NoopLogger`] is the default, [`TracingLogger`]
//! forwards to the `tracing` macros so an application subscriber picks the
//! messages up.

/// Diagnostics sink used by the request builder.
///
/// Implementations must tolerate concurrent calls.
pub trait Logger: Send + Sync {
    /// Request-level trace (URL, api, timestamp, params).
    fn debug(&self, message: &str);

    /// A build or dispatch step failed.
    fn error(&self, message: &str);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

/// Forwards to `tracing` under the `apigate` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "apigate", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "apigate", "{}", message);
    }
}
