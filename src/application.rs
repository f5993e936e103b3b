//! Application context.
//!
//! [`App`] bundles everything a request may need: configuration, the movie
//! store, the error tracker and the metrics sink. It is built once before
//! the server binds, never mutated afterwards, and shared with every request
//! through a reference-counted handle.

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::movies::{InMemoryMovies, MovieStore};
use crate::telemetry::{MetricsSink, PrometheusSink};
use crate::tracker::{ErrorTracker, LogTracker};

#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    movies: Arc<dyn MovieStore>,
    tracker: Arc<dyn ErrorTracker>,
    metrics: Arc<dyn MetricsSink>,
}

impl App {
    /// Builds the production context: seeded store, log tracker and the
    /// Prometheus sink (with exporter when `config.metrics_addr` is set).
    pub fn new(config: Config) -> Result<Self, Error> {
        let metrics = PrometheusSink::install(config.metrics_addr)?;
        Ok(Self::builder(config).metrics(metrics).build())
    }

    /// Builder with in-process defaults and no exporter. Used by tests and
    /// embedders that bring their own collaborators.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder {
            config,
            movies: None,
            tracker: None,
            metrics: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn movies(&self) -> &dyn MovieStore {
        self.inner.movies.as_ref()
    }

    pub fn tracker(&self) -> &dyn ErrorTracker {
        self.inner.tracker.as_ref()
    }

    pub fn metrics(&self) -> Arc<dyn MetricsSink> {
        Arc::clone(&self.inner.metrics)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App").field("config", &self.inner.config).finish_non_exhaustive()
    }
}

pub struct AppBuilder {
    config: Config,
    movies: Option<Arc<dyn MovieStore>>,
    tracker: Option<Arc<dyn ErrorTracker>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl AppBuilder {
    pub fn movies(mut self, store: impl MovieStore) -> Self {
        self.movies = Some(Arc::new(store));
        self
    }

    pub fn tracker(mut self, tracker: impl ErrorTracker) -> Self {
        self.tracker = Some(Arc::new(tracker));
        self
    }

    pub fn metrics(mut self, sink: impl MetricsSink) -> Self {
        self.metrics = Some(Arc::new(sink));
        self
    }

    /// Like [`metrics`](Self::metrics) for a sink the caller keeps a handle to.
    pub fn shared_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// Like [`tracker`](Self::tracker) for a tracker the caller keeps a handle to.
    pub fn shared_tracker(mut self, tracker: Arc<dyn ErrorTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn build(self) -> App {
        App {
            inner: Arc::new(Inner {
                config: self.config,
                movies: self.movies.unwrap_or_else(|| Arc::new(InMemoryMovies::seeded())),
                tracker: self.tracker.unwrap_or_else(|| Arc::new(LogTracker)),
                metrics: self.metrics.unwrap_or_else(|| Arc::new(PrometheusSink)),
            }),
        }
    }
}
