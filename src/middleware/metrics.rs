//! Request counter and latency histogram.

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;

use super::{Middleware, Next};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::telemetry::{MetricsSink, Observation, client_closed};

/// Reports exactly one [`Observation`] per request to the app's sink,
/// including requests dropped mid-flight (status 499).
pub struct RequestMetrics {
    sink: Arc<dyn MetricsSink>,
}

impl RequestMetrics {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }
}

impl Middleware for RequestMetrics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let mut pending = Pending {
                sink: self.sink.as_ref(),
                start: Instant::now(),
                method: req.method().as_str().to_owned(),
                route: req.route().unwrap_or("unmatched").to_owned(),
                recorded: false,
            };

            let res = next.run_resolved(req).await;
            pending.record(res.status_code());
            Ok(res)
        })
    }
}

/// Records on drop unless [`record`](Self::record) already ran.
struct Pending<'a> {
    sink: &'a dyn MetricsSink,
    start: Instant,
    method: String,
    route: String,
    recorded: bool,
}

impl Pending<'_> {
    fn record(&mut self, status: StatusCode) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        self.sink.observe(&Observation {
            route: std::mem::take(&mut self.route),
            method: std::mem::take(&mut self.method),
            status,
            latency: self.start.elapsed(),
        });
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.record(client_closed());
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<u16>>);

    impl MetricsSink for Recording {
        fn observe(&self, observation: &Observation) {
            self.0.lock().push(observation.status.as_u16());
        }
    }

    fn pending(sink: &Recording) -> Pending<'_> {
        Pending {
            sink,
            start: Instant::now(),
            method: "GET".to_owned(),
            route: "/movies".to_owned(),
            recorded: false,
        }
    }

    #[test]
    fn records_once_when_finished() {
        let sink = Recording::default();
        let mut p = pending(&sink);
        p.record(StatusCode::OK);
        drop(p);
        assert_eq!(*sink.0.lock(), [200]);
    }

    #[test]
    fn records_client_closed_when_dropped_unfinished() {
        let sink = Recording::default();
        drop(pending(&sink));
        assert_eq!(*sink.0.lock(), [499]);
    }
}
