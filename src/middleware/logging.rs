//! Per-request structured log line.

use std::time::Instant;

use http::StatusCode;
use tracing::{info, warn};

use super::{Middleware, Next};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::telemetry::client_closed;

/// Emits one `request completed` event per request with method, path,
/// matched route, status and latency. 5xx responses are logged at `warn`.
///
/// A request dropped before it produced a response (client gone, drain
/// deadline hit) is still logged once, at `warn`, with status 499 and
/// `cancelled = true`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let mut pending = Pending {
                start: Instant::now(),
                method: req.method().clone(),
                path: req.path().to_owned(),
                route: req.route().unwrap_or("unmatched").to_owned(),
                logged: false,
            };

            let res = next.run_resolved(req).await;
            pending.emit(res.status_code(), false);
            Ok(res)
        })
    }
}

/// Logs on drop unless [`emit`](Self::emit) already ran.
struct Pending {
    start: Instant,
    method: http::Method,
    path: String,
    route: String,
    logged: bool,
}

impl Pending {
    fn emit(&mut self, status: StatusCode, cancelled: bool) {
        if self.logged {
            return;
        }
        self.logged = true;

        let (method, path, route) = (&self.method, &self.path, &self.route);
        let status_code = status.as_u16();
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        if cancelled {
            warn!(%method, %path, %route, status = status_code, latency_ms, cancelled, "request completed");
        } else if status.is_server_error() {
            warn!(%method, %path, %route, status = status_code, latency_ms, "request completed");
        } else {
            info!(%method, %path, %route, status = status_code, latency_ms, "request completed");
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.emit(client_closed(), true);
    }
}
