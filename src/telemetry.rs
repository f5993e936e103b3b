//! Logging and metrics.
//!
//! Logging goes through `tracing`; [`init_logging`] installs the subscriber
//! once at startup. Request metrics go through a [`MetricsSink`] held by the
//! [`App`](crate::App). The default sink, [`PrometheusSink`], records through
//! the `metrics` facade and can optionally expose a Prometheus scrape
//! endpoint.
//!
//! # Standard metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `http_requests_total` | Counter | `route`, `method`, `status` |
//! | `http_request_duration_seconds` | Histogram | `route`, `method`, `status` |
//!
//! `status` is the class (`2xx`, `4xx`, ...), which keeps label cardinality
//! bounded.

use std::net::SocketAddr;
use std::time::Duration;

use http::StatusCode;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogConfig, LogFormat};
use crate::error::Error;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

// ── Logging ───────────────────────────────────────────────────────────────────

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.level` when set.
pub fn init_logging(config: &LogConfig) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Dependency { component: "logging", reason: e.to_string() })?;

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Dependency { component: "logging", reason: e.to_string() })
}

// ── Metrics ───────────────────────────────────────────────────────────────────

/// One finished request, as seen by the metrics stage.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Matched route pattern, or `"unmatched"`.
    pub route: String,
    pub method: String,
    pub status: StatusCode,
    pub latency: Duration,
}

impl Observation {
    pub fn status_class(&self) -> &'static str {
        status_class(self.status)
    }
}

/// Non-standard `499 Client Closed Request`, recorded for requests whose
/// future was dropped before a response existed.
pub fn client_closed() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT)
}

pub fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Receives exactly one [`Observation`] per request.
pub trait MetricsSink: Send + Sync + 'static {
    fn observe(&self, observation: &Observation);
}

/// Records through the global `metrics` recorder.
///
/// Without an installed recorder every call is a no-op, which is what tests
/// and local runs without `METRICS_ADDR` get.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrometheusSink;

impl PrometheusSink {
    /// Installs the Prometheus exporter on `addr` (when given) and registers
    /// metric descriptions. Requires a running Tokio runtime.
    pub fn install(addr: Option<SocketAddr>) -> Result<Self, Error> {
        if let Some(addr) = addr {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map_err(|e| Error::Dependency { component: "metrics exporter", reason: e.to_string() })?;
            tracing::info!(%addr, "metrics exporter listening");
        }

        describe_counter!(REQUESTS_TOTAL, "Total HTTP requests handled");
        describe_histogram!(REQUEST_DURATION, metrics::Unit::Seconds, "HTTP request latency");
        Ok(Self)
    }
}

impl MetricsSink for PrometheusSink {
    fn observe(&self, obs: &Observation) {
        let labels = [
            ("route", obs.route.clone()),
            ("method", obs.method.clone()),
            ("status", obs.status_class().to_owned()),
        ];
        counter!(REQUESTS_TOTAL, &labels).increment(1);
        histogram!(REQUEST_DURATION, &labels).record(obs.latency.as_secs_f64());
    }
}
