//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Routes are registered
//! while building the [`Router`]; once it is handed to a
//! [`Service`](crate::Service) the table is frozen.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

#[derive(Clone)]
struct Route {
    pattern: Arc<str>,
    handler: BoxedHandler,
}

/// A successful lookup.
pub(crate) struct Matched {
    pub(crate) pattern: Arc<str>,
    pub(crate) handler: BoxedHandler,
    pub(crate) params: HashMap<String, String>,
}

/// The application router.
///
/// Each registration call returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    len: usize,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), len: 0 }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use reel::{HandlerResult, Method, Request, Response, Router};
    /// # async fn get_movie(_: Request) -> HandlerResult { Ok(Response::text("")) }
    /// # async fn create_movie(_: Request) -> HandlerResult { Ok(Response::text("")) }
    /// Router::new()
    ///     .on(Method::Get,  "/movies/{id}", get_movie)
    ///     .on(Method::Post, "/movies",      create_movie);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with a route
    /// already registered for `method`. Routes are only registered at
    /// startup, so this surfaces before the server binds.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let route = Route { pattern: Arc::from(path), handler: handler.into_boxed_handler() };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self.len += 1;
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Option<Matched> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some(Matched {
            pattern: Arc::clone(&matched.value.pattern),
            handler: Arc::clone(&matched.value.handler),
            params,
        })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HandlerResult, Request, Response};

    async fn ok(_req: Request) -> HandlerResult {
        Ok(Response::text("ok"))
    }

    #[test]
    fn matches_method_and_extracts_params() {
        let router = Router::new()
            .get("/movies", ok)
            .get("/movies/{id}", ok)
            .post("/movies", ok);
        assert_eq!(router.len(), 3);

        let matched = router.lookup(Method::Get, "/movies/42").unwrap();
        assert_eq!(&*matched.pattern, "/movies/{id}");
        assert_eq!(matched.params.get("id").map(String::as_str), Some("42"));

        let matched = router.lookup(Method::Post, "/movies").unwrap();
        assert_eq!(&*matched.pattern, "/movies");
        assert!(matched.params.is_empty());
    }

    #[test]
    fn method_shorthands_register_separate_trees() {
        let router = Router::new()
            .put("/movies/{id}", ok)
            .delete("/movies/{id}", ok)
            .on(Method::Patch, "/movies/{id}", ok);
        assert_eq!(router.len(), 3);

        for method in [Method::Put, Method::Delete, Method::Patch] {
            let matched = router.lookup(method, "/movies/7").unwrap();
            assert_eq!(matched.params.get("id").map(String::as_str), Some("7"));
        }
        assert!(router.lookup(Method::Get, "/movies/7").is_none());
    }

    #[test]
    fn misses_on_unknown_path_or_method() {
        let router = Router::new().get("/health", ok);
        assert!(router.lookup(Method::Get, "/nope").is_none());
        assert!(router.lookup(Method::Post, "/health").is_none());
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic_at_registration() {
        let _ = Router::new().get("/movies/{id}", ok).get("/movies/{id}", ok);
    }
}
