//! Whole-pipeline behaviour, driven in-process through `Service::handle`.

mod support;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use parking_lot::Mutex;
use serde_json::Value;

use reel::middleware::{RequestLogger, RequestMetrics};
use reel::telemetry::{MetricsSink, Observation};
use reel::tracker::{ErrorContext, ErrorTracker};
use reel::{
    App, Binder, BoxFuture, Config, DecodeError, HandlerError, HandlerResult, INTERNAL_MESSAGE,
    Middleware, Next, Outcome, Pipeline, Request, Response, Router, Service, health, movies,
};

use support::Capture;

// ── Fixtures ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink(Mutex<Vec<Observation>>);

impl MetricsSink for RecordingSink {
    fn observe(&self, observation: &Observation) {
        self.0.lock().push(observation.clone());
    }
}

#[derive(Default)]
struct RecordingTracker(Mutex<Vec<String>>);

impl ErrorTracker for RecordingTracker {
    fn capture(&self, error: &HandlerError, context: ErrorContext<'_>) {
        self.0.lock().push(format!("{} {}: {error}", context.method, context.path));
    }
}

struct Harness {
    service: Service,
    metrics: Arc<RecordingSink>,
    tracker: Arc<RecordingTracker>,
}

async fn boom(_req: Request) -> HandlerResult {
    panic!("kaboom at row 7")
}

async fn stall(_req: Request) -> HandlerResult {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Ok(Response::text("too late"))
}

fn router() -> Router {
    movies::routes(health::routes(Router::new()))
        .get("/boom", boom)
        .get("/stall", stall)
}

fn harness() -> Harness {
    let metrics = Arc::new(RecordingSink::default());
    let tracker = Arc::new(RecordingTracker::default());
    let app = App::builder(Config::default())
        .shared_metrics(metrics.clone())
        .shared_tracker(tracker.clone())
        .build();
    Harness { service: Service::new(app, router()), metrics, tracker }
}

async fn send(service: &Service, method: Method, path: &str, body: &str) -> (StatusCode, Value) {
    let req = http::Request::builder()
        .method(method)
        .uri(path)
        .body(Full::new(Bytes::from(body.to_owned())))
        .unwrap();
    let res = service.handle(req).await;
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

// ── Routing and errors ────────────────────────────────────────────────────────

#[tokio::test]
async fn unmatched_route_is_404_json() {
    let h = harness();

    let (status, body) = send(&h.service, Method::GET, "/nope", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");

    // Unknown method on a known path goes to the same fallback.
    let (status, _) = send(&h.service, Method::PATCH, "/movies", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_checks_before_the_server_runs() {
    let h = harness();

    let (status, body) = send(&h.service, Method::GET, "/healthz", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);

    // Not ready until a server has started serving.
    let (status, body) = send(&h.service, Method::GET, "/health", "").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["phase"], "initializing");
}

#[tokio::test]
async fn panic_becomes_generic_500_and_service_keeps_going() {
    let h = harness();

    let (status, body) = send(&h.service, Method::GET, "/boom", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, serde_json::json!({ "error": INTERNAL_MESSAGE }));

    let captured = h.tracker.0.lock().clone();
    assert_eq!(captured.len(), 1);
    assert!(captured[0].starts_with("GET /boom"));
    assert!(captured[0].contains("kaboom at row 7"));

    let (status, body) = send(&h.service, Method::GET, "/movies/1", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Iron Man");
}

#[tokio::test]
async fn malformed_body_is_400_and_handler_stops_at_bind() {
    let h = harness();

    let (status, body) = send(&h.service, Method::POST, "/movies", "{\"title\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("malformed JSON body"));

    let (status, body) = send(&h.service, Method::POST, "/movies", r#"{"title": 42}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));

    // Nothing was stored.
    let (_, body) = send(&h.service, Method::GET, "/movies", r#"{"limit": 100}"#).await;
    assert_eq!(body.as_array().unwrap().len(), 23);
    assert!(h.tracker.0.lock().is_empty());
}

// ── Movies ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn movie_lookup() {
    let h = harness();

    let (status, body) = send(&h.service, Method::GET, "/movies/9999", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, serde_json::json!({ "error": "movie not found" }));

    let (status, body) = send(&h.service, Method::GET, "/movies/abc", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid movie id `abc`");
}

#[tokio::test]
async fn movie_listing_pages() {
    let h = harness();

    let (status, body) = send(&h.service, Method::GET, "/movies", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), movies::DEFAULT_LIMIT);

    let (_, body) = send(&h.service, Method::GET, "/movies", r#"{"limit": 2, "offset": 1}"#).await;
    let ids: Vec<u64> = body.as_array().unwrap().iter().map(|m| m["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, [2, 3]);
}

#[tokio::test]
async fn movie_creation() {
    let h = harness();

    let (status, body) = send(
        &h.service,
        Method::POST,
        "/movies",
        r#"{"title": "  Goyagi ", "release_date": "2019-01-30T00:00:00Z"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 24);
    assert_eq!(body["title"], "Goyagi");

    let (_, fetched) = send(&h.service, Method::GET, "/movies/24", "").await;
    assert_eq!(fetched, body);

    let (status, body) = send(
        &h.service,
        Method::POST,
        "/movies",
        r#"{"title": "   ", "release_date": "2012-05-04T00:00:00Z"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "title is required");
}

// ── Observability ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_metrics_observation_per_request() {
    let h = harness();

    send(&h.service, Method::GET, "/movies/1", "").await;
    send(&h.service, Method::GET, "/nope", "").await;
    send(&h.service, Method::GET, "/boom", "").await;
    send(&h.service, Method::POST, "/movies", "not json").await;

    let seen: Vec<(String, String, u16)> = h
        .metrics
        .0
        .lock()
        .iter()
        .map(|o| (o.route.clone(), o.method.clone(), o.status.as_u16()))
        .collect();
    assert_eq!(
        seen,
        [
            ("/movies/{id}".to_owned(), "GET".to_owned(), 200),
            ("unmatched".to_owned(), "GET".to_owned(), 404),
            ("/boom".to_owned(), "GET".to_owned(), 500),
            ("/movies".to_owned(), "POST".to_owned(), 400),
        ]
    );
}

#[tokio::test]
async fn one_log_line_per_request() {
    let (capture, _guard) = Capture::install();

    let h = harness();
    send(&h.service, Method::GET, "/healthz", "").await;
    send(&h.service, Method::GET, "/boom", "").await;
    send(&h.service, Method::GET, "/movies/9999", "").await;

    let logs = capture.logs();
    let completed = capture.lines_with("request completed");
    assert_eq!(completed.len(), 3, "{logs}");
    assert!(completed[0].contains("route=/healthz") && completed[0].contains("status=200"));
    assert!(completed[1].contains("WARN") && completed[1].contains("status=500"));
    assert!(completed[2].contains("route=/movies/{id}") && completed[2].contains("status=404"));
    assert!(logs.contains("recovered from panic in request handler"));
}

#[tokio::test]
async fn dropped_request_is_still_logged_and_measured_once() {
    let (capture, _guard) = Capture::install();
    let metrics = Arc::new(RecordingSink::default());
    let app = App::builder(Config::default()).shared_metrics(metrics.clone()).build();
    let service = Arc::new(Service::new(app, router()));

    let req = http::Request::builder().uri("/stall").body(Full::new(Bytes::new())).unwrap();
    let task = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.handle(req).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    let seen = metrics.0.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].route, "/stall");
    assert_eq!(seen[0].status.as_u16(), 499);

    let completed = capture.lines_with("request completed");
    assert_eq!(completed.len(), 1, "{}", capture.logs());
    assert!(completed[0].contains("status=499"));
    assert!(completed[0].contains("cancelled=true"));
}

#[tokio::test]
async fn oversized_body_is_not_read() {
    let config = Config { max_body_bytes: 64, ..Config::default() };
    let service = Service::new(App::builder(config).build(), router());
    let big = format!(
        r#"{{"title": "{}", "release_date": "2019-01-30T00:00:00Z"}}"#,
        "x".repeat(100)
    );

    let (status, body) = send(&service, Method::POST, "/movies", &big).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unreadable request body: body exceeds 64 bytes");

    let (status, _) = send(&service, Method::GET, "/movies/24", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Routes that never bind do not care.
    let (status, _) = send(&service, Method::GET, "/healthz", &big).await;
    assert_eq!(status, StatusCode::OK);
}

// ── Custom wiring ─────────────────────────────────────────────────────────────

struct RejectAll;

impl Binder for RejectAll {
    fn decode(&self, _body: &[u8]) -> Result<Value, DecodeError> {
        Err(DecodeError::Unreadable("binder disabled".to_owned()))
    }
}

#[tokio::test]
async fn installed_binder_applies_to_every_route() {
    let app = App::builder(Config::default()).build();
    let service = Service::builder(app).binder(RejectAll).build(router());

    let (status, body) = send(&service, Method::GET, "/movies", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unreadable request body: binder disabled");

    // Routes that never bind are unaffected.
    let (status, _) = send(&service, Method::GET, "/movies/1", "").await;
    assert_eq!(status, StatusCode::OK);
}

/// Records entry and exit so the runtime order can be checked.
struct Trace {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Middleware for Trace {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            self.log.lock().push(format!("enter {}", self.name));
            let outcome = next.run(req).await;
            self.log.lock().push(format!("exit {}", self.name));
            outcome
        })
    }
}

#[tokio::test]
async fn stages_run_outermost_first_and_recover_before_outer_stages_see_a_panic() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let metrics = Arc::new(RecordingSink::default());
    let app = App::builder(Config::default()).shared_metrics(metrics.clone()).build();

    let pipeline = Pipeline::builder()
        .stage(RequestLogger)
        .stage(Trace { name: "outer", log: log.clone() })
        .stage(RequestMetrics::new(app.metrics()))
        .stage(Trace { name: "inner", log: log.clone() })
        .build();
    assert_eq!(pipeline.names(), ["logging", "outer", "metrics", "inner", "recovery"]);

    let service = Service::builder(app).pipeline(pipeline).build(router());
    let (status, _) = send(&service, Method::GET, "/boom", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(*log.lock(), ["enter outer", "enter inner", "exit inner", "exit outer"]);
    assert_eq!(metrics.0.lock().len(), 1);
}
