//! Panic containment.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::error;

use super::{Middleware, Next};
use crate::error::HandlerError;
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;

/// Catches a panic anywhere below it and turns it into
/// [`HandlerError::Panicked`]. The panic stays inside the request that
/// raised it; the connection and the server keep going.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recover;

impl Middleware for Recover {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let method = req.method().clone();
            let path = req.path().to_owned();

            // State reachable from handlers is internally synchronised.
            match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let detail = panic_message(payload.as_ref());
                    error!(%method, %path, panic = %detail, "recovered from panic in request handler");
                    Err(HandlerError::Panicked(detail))
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(f: impl FnOnce() + std::panic::UnwindSafe) -> Box<dyn Any + Send> {
        std::panic::catch_unwind(f).unwrap_err()
    }

    #[test]
    fn extracts_panic_messages() {
        let payload = payload_of(|| panic!("static"));
        assert_eq!(panic_message(payload.as_ref()), "static");

        let id = 7;
        let payload = payload_of(move || panic!("movie {id}"));
        assert_eq!(panic_message(payload.as_ref()), "movie 7");

        let payload = payload_of(|| std::panic::panic_any(42_u8));
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
