//! Error tracking.
//!
//! Unclassified failures (including recovered panics) are handed to an
//! [`ErrorTracker`] by the error handler, so a hosted tracker can be plugged
//! in without touching the pipeline. [`LogTracker`] is the default and just
//! logs.

use crate::error::HandlerError;

/// Where an unexpected error happened.
#[derive(Clone, Copy, Debug)]
pub struct ErrorContext<'a> {
    pub method: &'a str,
    pub path: &'a str,
}

/// Receives every error that turns into a 500.
pub trait ErrorTracker: Send + Sync + 'static {
    fn capture(&self, error: &HandlerError, context: ErrorContext<'_>);
}

/// Logs captured errors at `error` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTracker;

impl ErrorTracker for LogTracker {
    fn capture(&self, error: &HandlerError, context: ErrorContext<'_>) {
        tracing::error!(
            method = context.method,
            path = context.path,
            error = %error,
            "unhandled error"
        );
    }
}
