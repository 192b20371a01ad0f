//! Event sink used by the connection handler to report failures.
//!
//! Logging is fire and forget: a sink must never block or fail in a way that affects the
//! protocol. [`TracingSink`] forwards to [`tracing`], which is what the server uses outside of tests.

use std::fmt::{Display, Formatter};

/// How severe a logged event is.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum Severity {
    /// Expected failures such as disconnects and wrong passwords.
    NonCritical,
    /// Events that indicate a hostile or broken peer, such as declared counts above the limits.
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::NonCritical => write!(f, "NONCRIT"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Receives events from the connection handler.
pub trait EventSink {
    /// Records a single event.
    fn record(&self, severity: Severity, message: &str);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn record(&self, severity: Severity, message: &str) {
        (**self).record(severity, message);
    }
}

/// Forwards events to [`tracing`].
///
/// Critical events are emitted at the `ERROR` level and everything else at `WARN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Critical => tracing::error!(critical = true, "{}", message),
            Severity::NonCritical => tracing::warn!(critical = false, "{}", message),
        }
    }
}
