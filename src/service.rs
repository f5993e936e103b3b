//! Request dispatch.
//!
//! A [`Service`] is everything the server needs to answer a request: the
//! frozen route table, the binder, the middleware pipeline, the error
//! handler and the application context. It is assembled once, before the
//! server binds, and shared read-only by every connection afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};

use crate::application::App;
use crate::binder::{Binder, JsonBinder};
use crate::handler::{self, BoxedHandler, Handler};
use crate::lifecycle::Lifecycle;
use crate::method::Method;
use crate::middleware::Pipeline;
use crate::normalize::{ErrorHandler, JsonErrorHandler};
use crate::request::Request;
use crate::router::Router;

pub struct Service {
    router: Router,
    pipeline: Pipeline,
    binder: Arc<dyn Binder>,
    errors: Arc<dyn ErrorHandler>,
    fallback: BoxedHandler,
    app: App,
    lifecycle: Lifecycle,
}

impl Service {
    /// Standard wiring: [`JsonBinder`], [`Pipeline::standard`] and
    /// [`JsonErrorHandler`] reporting to the app's tracker.
    pub fn new(app: App, router: Router) -> Self {
        Self::builder(app).build(router)
    }

    pub fn builder(app: App) -> ServiceBuilder {
        ServiceBuilder {
            pipeline: Pipeline::standard(&app),
            binder: Arc::new(JsonBinder),
            errors: Arc::new(JsonErrorHandler::for_app(&app)),
            app,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Routes one request through the pipeline and returns its response.
    ///
    /// Never fails: routing misses, unreadable bodies, handler errors and
    /// handler panics all come back as normalised error responses.
    ///
    /// At most `max_body_bytes` of the body are read. A longer body is
    /// abandoned and reported as unreadable when the handler binds it.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_owned();

        let (endpoint, params, route) = match Method::from_http(&parts.method)
            .and_then(|m| self.router.lookup(m, &path))
        {
            Some(matched) => (matched.handler, matched.params, Some(matched.pattern)),
            None => (Arc::clone(&self.fallback), HashMap::new(), None),
        };

        let limit = self.app.config().max_body_bytes;
        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.is::<LengthLimitError>() => Err(format!("body exceeds {limit} bytes")),
            Err(e) => Err(e.to_string()),
        };

        let req = Request {
            method: parts.method,
            path,
            headers: parts.headers,
            body,
            params,
            route,
            app: self.app.clone(),
            binder: Arc::clone(&self.binder),
            lifecycle: self.lifecycle.clone(),
        };

        self.pipeline
            .run(req, &endpoint, self.errors.as_ref())
            .await
            .into_inner()
    }
}

/// Installs the global pieces before the route table is frozen.
pub struct ServiceBuilder {
    app: App,
    pipeline: Pipeline,
    binder: Arc<dyn Binder>,
    errors: Arc<dyn ErrorHandler>,
}

impl ServiceBuilder {
    /// Replaces the body decoder for every route.
    pub fn binder(mut self, binder: impl Binder) -> Self {
        self.binder = Arc::new(binder);
        self
    }

    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn error_handler(mut self, errors: impl ErrorHandler) -> Self {
        self.errors = Arc::new(errors);
        self
    }

    /// Freezes `router` and finishes the service.
    pub fn build(self, router: Router) -> Service {
        Service {
            router,
            pipeline: self.pipeline,
            binder: self.binder,
            errors: self.errors,
            fallback: handler::not_found.into_boxed_handler(),
            app: self.app,
            lifecycle: Lifecycle::new(),
        }
    }
}
