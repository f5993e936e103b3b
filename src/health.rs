//! Health-check handlers.
//!
//! | Check | Path | Answers |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Always 200. |
//! | **Readiness** | `/health` | Should traffic be sent here? 200 while serving, 503 otherwise. |
//!
//! Readiness follows the server's [`Phase`]: it starts failing the moment a
//! drain begins, so a load balancer stops routing new requests to this
//! instance while in-flight ones finish.

use http::StatusCode;
use serde::Serialize;

use crate::error::HandlerResult;
use crate::lifecycle::Phase;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

#[derive(Serialize)]
struct Status {
    healthy: bool,
    phase: &'static str,
}

/// Registers `/health` and `/healthz` on `router`.
pub fn routes(router: Router) -> Router {
    router.get("/health", readiness).get("/healthz", liveness)
}

/// Always `200 OK`. Has no dependencies on purpose.
pub async fn liveness(req: Request) -> HandlerResult {
    Response::json(&Status { healthy: true, phase: req.phase().as_str() })
}

pub async fn readiness(req: Request) -> HandlerResult {
    let phase = req.phase();
    let healthy = phase == Phase::Serving;
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    Response::builder()
        .status(status)
        .json(&Status { healthy, phase: phase.as_str() })
}
