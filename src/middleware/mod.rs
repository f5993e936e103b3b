//! Middleware pipeline.
//!
//! Every request, matched or not, runs through the same fixed chain before
//! its handler:
//!
//! ```text
//! RequestLogger ─▶ RequestMetrics ─▶ Recover ─▶ handler
//!   (outermost)                     (innermost)
//! ```
//!
//! The order is part of the contract:
//!
//! - [`Recover`] sits directly around the handler so that every other stage
//!   is outside the blast radius of a handler panic. [`PipelineBuilder`]
//!   always appends it last; it cannot be moved or left out.
//! - [`RequestMetrics`] and [`RequestLogger`] sit outside it so they record
//!   every request, including the ones that panicked.
//!
//! A stage that needs the final status calls [`Next::run_resolved`], which
//! hands any error to the registered [`ErrorHandler`] once and returns the
//! resulting response. Stages further out then see a plain `Ok`.

mod logging;
mod metrics;
mod recovery;

use std::sync::Arc;

pub use self::logging::RequestLogger;
pub use self::metrics::RequestMetrics;
pub use self::recovery::Recover;

use crate::application::App;
use crate::handler::{BoxFuture, BoxedHandler, Outcome};
use crate::normalize::ErrorHandler;
use crate::request::Request;
use crate::response::Response;
use crate::tracker::ErrorContext;

/// A pipeline stage.
pub trait Middleware: Send + Sync + 'static {
    /// Short name used in logs and in [`Pipeline::names`].
    fn name(&self) -> &'static str;

    /// Handles `req`, usually by calling `next.run(req)` and inspecting the
    /// outcome.
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

/// The rest of the chain, as seen from one stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    endpoint: &'a BoxedHandler,
    errors: &'a dyn ErrorHandler,
}

impl<'a> Next<'a> {
    /// Runs the remaining stages and the handler.
    pub async fn run(self, req: Request) -> Outcome {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next { stages: rest, endpoint: self.endpoint, errors: self.errors };
                stage.handle(req, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }

    /// Like [`run`](Self::run), but an error outcome is turned into its
    /// response by the error handler.
    pub async fn run_resolved(self, req: Request) -> Response {
        let method = req.method().clone();
        let path = req.path().to_owned();
        let errors = self.errors;
        match self.run(req).await {
            Ok(res) => res,
            Err(err) => errors.handle(&err, ErrorContext { method: method.as_str(), path: &path }),
        }
    }
}

/// An ordered, immutable list of stages. Built once at startup.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Logging, then metrics, then recovery.
    pub fn standard(app: &App) -> Self {
        Self::builder()
            .stage(RequestLogger)
            .stage(RequestMetrics::new(app.metrics()))
            .build()
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Stage names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub(crate) async fn run(
        &self,
        req: Request,
        endpoint: &BoxedHandler,
        errors: &dyn ErrorHandler,
    ) -> Response {
        Next { stages: &self.stages, endpoint, errors }.run_resolved(req).await
    }
}

/// Collects stages outermost first. [`Recover`] is appended by
/// [`build`](Self::build).
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: impl Middleware) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build(mut self) -> Pipeline {
        self.stages.push(Arc::new(Recover));
        Pipeline { stages: self.stages }
    }
}
