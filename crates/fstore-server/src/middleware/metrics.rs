//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Store-level counters (dedup outcomes, uploaded bytes) are
//! pushed by the `/files` handlers. The stored-files gauge is refreshed on
//! each `/metrics` scrape (pull model), see the metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use fstore_core::protocol::FILES_PATH;

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Store metrics --
    dedup_outcomes_total: IntCounterVec,
    uploaded_files_total: IntCounter,
    uploaded_bytes_total: IntCounter,
    stored_files: IntGauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .field("uploaded_bytes", &self.uploaded_bytes())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("fstore_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "fstore_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("fstore_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let dedup_outcomes_total = IntCounterVec::new(
            Opts::new(
                "fstore_dedup_outcomes_total",
                "Dedup negotiation pairs by outcome",
            ),
            &["outcome"],
        )
        .expect("metric can be created");

        let uploaded_files_total = IntCounter::new(
            "fstore_uploaded_files_total",
            "Files committed through bulk upload",
        )
        .expect("metric can be created");

        let uploaded_bytes_total = IntCounter::new(
            "fstore_uploaded_bytes_total",
            "Bytes committed through bulk upload",
        )
        .expect("metric can be created");

        let stored_files = IntGauge::new("fstore_stored_files", "Regular files in the storage root")
            .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(dedup_outcomes_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(uploaded_files_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(uploaded_bytes_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(stored_files.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                dedup_outcomes_total,
                uploaded_files_total,
                uploaded_bytes_total,
                stored_files,
            }),
        }
    }

    /// Return current total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counters(&self.inner.http_requests_total)
    }

    /// Return current total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counters(&self.inner.http_errors_total)
    }

    /// Record an HTTP request (called by the middleware).
    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Count one negotiated pair under its outcome label.
    pub fn record_dedup_outcome(&self, outcome: &str) {
        self.inner
            .dedup_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn dedup_outcomes(&self, outcome: &str) -> u64 {
        self.inner
            .dedup_outcomes_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Count a committed bulk upload.
    pub fn record_upload(&self, files: u64, bytes: u64) {
        self.inner.uploaded_files_total.inc_by(files);
        self.inner.uploaded_bytes_total.inc_by(bytes);
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.inner.uploaded_bytes_total.get()
    }

    /// Access the stored-files gauge for updating.
    pub fn stored_files(&self) -> &IntGauge {
        &self.inner.stored_files
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn sum_counters(vec: &IntCounterVec) -> u64 {
    let mut total = 0u64;
    for mf in &vec.collect() {
        for m in mf.get_metric() {
            total += m.get_counter().get_value() as u64;
        }
    }
    total
}

/// Collapse request paths to the fixed set the server routes.
///
/// Anything unrouted is labelled `other` so scanners probing random paths
/// cannot grow label cardinality.
fn normalize_path(path: &str) -> &'static str {
    match path {
        FILES_PATH => FILES_PATH,
        "/health/liveness" => "/health/liveness",
        "/health/readiness" => "/health/readiness",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, path, status, duration);
    }

    response
}
