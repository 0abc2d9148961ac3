//! Single reporting contract for fetch and consumer failures.

use tracing::{debug, warn};

use crate::Error;

/// Fire-and-forget sink for failures, tagged with a context such as
/// `player/<uuid>/<GAMETYPE>`.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &Error, context: &str);
}

/// Reporter that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &Error, context: &str) {
        if error.is_transient_fetch() {
            debug!(context = %context, error = %error, "transient fetch failure");
        } else {
            warn!(context = %context, error = %error, "update failure");
        }
    }
}
