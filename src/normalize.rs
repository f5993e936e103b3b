//! Error normalisation.
//!
//! Every [`HandlerError`] that leaves a handler or a middleware stage ends up
//! here, and this is the only place that decides its status code:
//!
//! | Error | Status | Body |
//! |---|---|---|
//! | `NotFound` | 404 | the error message |
//! | `Decode`, `Invalid` | 400 | the error message |
//! | `Panicked`, `Internal` | 500 | `"internal server error"` |
//!
//! Bodies are always `{"error": "<message>"}`. 500s never echo the
//! underlying error; it goes to the [`ErrorTracker`] instead.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;

use crate::application::App;
use crate::error::HandlerError;
use crate::response::Response;
use crate::tracker::{ErrorContext, ErrorTracker};

pub const INTERNAL_MESSAGE: &str = "internal server error";

/// Turns a request's error into its response.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, error: &HandlerError, context: ErrorContext<'_>) -> Response;
}

/// Status policy for every error class.
pub fn status_for(error: &HandlerError) -> StatusCode {
    match error {
        HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
        HandlerError::Decode(_) | HandlerError::Invalid(_) => StatusCode::BAD_REQUEST,
        HandlerError::Panicked(_) | HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// The default handler: JSON body, unclassified errors reported to the
/// app's tracker.
pub struct JsonErrorHandler {
    tracker: Arc<dyn ErrorTracker>,
}

impl JsonErrorHandler {
    pub fn new(tracker: Arc<dyn ErrorTracker>) -> Self {
        Self { tracker }
    }

    /// Reports through whatever tracker `app` was built with.
    pub fn for_app(app: &App) -> Self {
        Self::new(Arc::new(AppTracker(app.clone())))
    }
}

impl ErrorHandler for JsonErrorHandler {
    fn handle(&self, error: &HandlerError, context: ErrorContext<'_>) -> Response {
        let status = status_for(error);
        let message = if status.is_server_error() {
            self.tracker.capture(error, context);
            INTERNAL_MESSAGE.to_owned()
        } else {
            error.to_string()
        };

        // Cannot fail for a single string field.
        let body = serde_json::to_vec(&ErrorBody { error: &message })
            .unwrap_or_else(|_| br#"{"error":"internal server error"}"#.to_vec());

        let mut res = Response::status(status);
        res.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        res.body = Bytes::from(body);
        res
    }
}

/// Forwards to the tracker held by an [`App`].
struct AppTracker(App);

impl ErrorTracker for AppTracker {
    fn capture(&self, error: &HandlerError, context: ErrorContext<'_>) {
        self.0.tracker().capture(error, context);
    }
}
