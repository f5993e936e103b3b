//! Error types.
//!
//! Two families:
//!
//! - [`Error`] is process-level. Startup failures and serve-loop failures are
//!   fatal; a drain that overruns its grace period is logged and swallowed.
//! - [`HandlerError`] is per-request. Handlers and middleware return it and
//!   the registered [`ErrorHandler`](crate::ErrorHandler) turns it into a
//!   status code and JSON body. It never leaves the request it belongs to.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::binder::DecodeError;
use crate::config::ConfigError;

/// Process-level failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// OS signal handlers could not be registered.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// A collaborator (store, metrics exporter, error tracker) failed to start.
    #[error("failed to initialise {component}: {reason}")]
    Dependency {
        component: &'static str,
        reason: String,
    },

    /// The accept loop ended for a reason other than a requested shutdown.
    #[error("serve loop terminated: {0}")]
    Serve(#[source] std::io::Error),

    /// Connections were still open when the grace period ran out.
    #[error("{outstanding} connection(s) still open after {grace:?} grace period")]
    Drain {
        outstanding: usize,
        grace: Duration,
    },
}

impl Error {
    /// `true` for errors raised before the server starts accepting.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Bind { .. } | Self::Signal(_) | Self::Dependency { .. }
        )
    }

    /// `true` unless the error is a drain overrun, which is only logged.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Drain { .. })
    }
}

/// Per-request failure returned by handlers and middleware.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A route or a resource does not exist.
    #[error("{0}")]
    NotFound(Cow<'static, str>),

    /// The request body could not be decoded into the expected shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Input decoded fine but is not acceptable.
    #[error("{0}")]
    Invalid(Cow<'static, str>),

    /// A panic was caught by the recovery stage.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Anything else.
    #[error("{0}")]
    Internal(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl HandlerError {
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn internal(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Internal(err.into())
    }
}

/// Shorthand for handler return types.
pub type HandlerResult<T = crate::Response> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_is_the_only_non_fatal_error() {
        let drain = Error::Drain { outstanding: 2, grace: Duration::from_secs(1) };
        assert!(!drain.is_fatal());
        assert!(!drain.is_startup());

        let serve = Error::Serve(std::io::Error::other("boom"));
        assert!(serve.is_fatal());
        assert!(!serve.is_startup());

        let bind = Error::Bind {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert!(bind.is_startup());
    }

    #[test]
    fn internal_wraps_any_error() {
        let err = HandlerError::internal("database unavailable");
        assert_eq!(err.to_string(), "database unavailable");
    }
}
