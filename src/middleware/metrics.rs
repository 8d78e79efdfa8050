use super::{Middleware, Next};
use crate::error::RequestError;
use crate::server::{HttpRequest, HttpResponse};
use http::Method;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Middleware collecting request and connection counters.
///
/// All counters use relaxed atomics, so recording never takes a lock and
/// reads are eventually consistent. Register it early (low priority) so the
/// recorded latency covers the rest of the chain, and wire
/// [`connection_opened`]/[`connection_closed`] into the connection events to
/// populate the connection gauges.
///
/// `GET /metrics` is answered directly by this middleware with a
/// Prometheus-style text rendering; the request never reaches the routing
/// stage.
///
/// [`connection_opened`]: RequestMetrics::connection_opened
/// [`connection_closed`]: RequestMetrics::connection_closed
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    total_latency_us: AtomicU64,
    connections_active: AtomicI64,
    connections_total: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub average_latency_us: u64,
    pub connections_active: i64,
    pub connections_total: u64,
}

impl RequestMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requests that went through the chain.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Requests that ended in an error (unrouted, method mismatch, or a
    /// failed handler).
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Mean chain latency across all recorded requests; zero before the
    /// first request.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.requests.load(Ordering::Relaxed);
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.total_latency_us.load(Ordering::Relaxed) / count)
        }
    }

    /// Record a connection being accepted.
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection going away.
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    fn record(&self, latency: Duration, failed: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.request_count(),
            errors: self.error_count(),
            average_latency_us: self.average_latency().as_micros() as u64,
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text rendering of the current counters.
    #[must_use]
    pub fn render(&self) -> String {
        let snap = self.snapshot();
        format!(
            "# HELP maypole_requests_total Requests dispatched through the chain\n\
             # TYPE maypole_requests_total counter\n\
             maypole_requests_total {}\n\
             # HELP maypole_request_errors_total Requests that ended in an error\n\
             # TYPE maypole_request_errors_total counter\n\
             maypole_request_errors_total {}\n\
             # HELP maypole_request_latency_us_avg Mean chain latency in microseconds\n\
             # TYPE maypole_request_latency_us_avg gauge\n\
             maypole_request_latency_us_avg {}\n\
             # HELP maypole_connections_active Currently open connections\n\
             # TYPE maypole_connections_active gauge\n\
             maypole_connections_active {}\n\
             # HELP maypole_connections_total Connections accepted since start\n\
             # TYPE maypole_connections_total counter\n\
             maypole_connections_total {}\n",
            snap.requests,
            snap.errors,
            snap.average_latency_us,
            snap.connections_active,
            snap.connections_total,
        )
    }
}

impl Middleware for RequestMetrics {
    fn handle(&self, req: HttpRequest, next: Next<'_>) -> Result<HttpResponse, RequestError> {
        if req.method == Method::GET && req.path == "/metrics" {
            return Ok(HttpResponse::text(200, self.render())
                .with_header("Content-Type", "text/plain; version=0.0.4"));
        }

        let started = Instant::now();
        let result = next.run(req);
        self.record(started.elapsed(), result.is_err());
        result
    }
}
