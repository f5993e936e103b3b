//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;

use crate::application::App;
use crate::binder::{self, Binder, DecodeError};
use crate::error::HandlerError;
use crate::lifecycle::{Lifecycle, Phase};

/// An incoming request, with its body already read and its route matched.
pub struct Request {
    pub(crate) method: http::Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Result<Bytes, String>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) route: Option<Arc<str>>,
    pub(crate) app: App,
    pub(crate) binder: Arc<dyn Binder>,
    pub(crate) lifecycle: Lifecycle,
}

impl Request {
    pub fn method(&self) -> &http::Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Raw body bytes. Empty if the body could not be read; use
    /// [`bind`](Self::bind) to get the read error.
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Header lookup; names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/movies/{id}`, `req.param("id")` on `/movies/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The pattern of the matched route, `None` for the not-found fallback.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn app(&self) -> &App { &self.app }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Decodes the body into `T` with the installed binder.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let body = self
            .body
            .as_ref()
            .map_err(|e| DecodeError::Unreadable(e.clone()))?;
        Ok(binder::bind(self.binder.as_ref(), body)?)
    }
}
