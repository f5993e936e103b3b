//! Server lifecycle phases.
//!
//! ```text
//! Initializing ──bind──▶ Serving ──trigger──▶ Draining ──drained / deadline──▶ Stopped
//! ```
//!
//! The [`Server`](crate::Server) is the only writer. Handlers read the phase
//! through [`Request::phase`](crate::Request::phase), which is how the
//! readiness check starts failing as soon as a drain begins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Phase {
    Initializing = 0,
    Serving = 1,
    Draining = 2,
    Stopped = 3,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Initializing,
            1 => Self::Serving,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Shared, cheaply cloneable view of the current [`Phase`].
#[derive(Clone, Debug)]
pub struct Lifecycle(Arc<AtomicU8>);

impl Lifecycle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(Phase::Initializing as u8)))
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next`. Phases only advance; a backwards move is ignored.
    pub(crate) fn advance(&self, next: Phase) {
        self.0.fetch_max(next as u8, Ordering::AcqRel);
        tracing::debug!(phase = next.as_str(), "lifecycle phase changed");
    }
}

impl Default for Lifecycle {
    fn default() -> Self { Self::new() }
}
