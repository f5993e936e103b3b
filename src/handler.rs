//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of different concrete types in one table, so
//! each one is erased behind `dyn ErasedHandler`:
//!
//! ```text
//! async fn get_movie(req: Request) -> HandlerResult<Response> { … }   ← user writes this
//!        ↓ router.get("/movies/{id}", get_movie)
//! get_movie.into_boxed_handler()                  ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_movie))                  ← stored as BoxedHandler
//!        ↓
//! handler.call(req) at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_movie(req).await.map(IntoResponse::into_response) })
//! ```
//!
//! The error half of the result is left alone: it travels up through the
//! middleware pipeline and is turned into a response by the registered
//! [`ErrorHandler`](crate::ErrorHandler).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A request's result before error normalisation.
pub type Outcome = Result<Response, HandlerError>;

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any `async fn` with
/// the signature:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, HandlerError>
/// ```
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}

/// Fallback for unmatched method + path pairs.
pub(crate) async fn not_found(_req: Request) -> Result<Response, HandlerError> {
    Err(HandlerError::not_found("not found"))
}
