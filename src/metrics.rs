use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use axum::{Json, Router, routing::get};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;

use crate::web::{
    BoxFuture, BoxHandler, Handler, HandlerResult, Middleware, RequestContext, ResponseSink,
};

/// `sampled_concurrency` is refreshed on every Nth request.
pub const SAMPLE_EVERY: u64 = 10;

/// Process-scoped request counters.
///
/// One instance is built at startup and injected into [`RequestMetrics`];
/// tests build their own.
#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    errors: AtomicU64,
    in_flight: AtomicI64,
    sampled_concurrency: AtomicI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub in_flight: i64,
    pub sampled_concurrency: i64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            sampled_concurrency: self.sampled_concurrency.load(Ordering::Relaxed),
        }
    }

    fn begin(&self) -> InFlight<'_> {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        if n % SAMPLE_EVERY == 0 {
            self.sampled_concurrency.store(in_flight, Ordering::Relaxed);
        }

        counter!("http_requests_total").increment(1);
        gauge!("http_requests_in_flight").increment(1.0);
        InFlight { metrics: self }
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!("http_request_errors_total").increment(1);
    }
}

/// Decrements `in_flight` even if the request future is dropped mid-way.
struct InFlight<'a> {
    metrics: &'a Metrics,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
        gauge!("http_requests_in_flight").decrement(1.0);
    }
}

/// Counts requests and failed results. Never changes the outcome.
pub struct RequestMetrics {
    metrics: Arc<Metrics>,
}

impl RequestMetrics {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for RequestMetrics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        Arc::new(MetricsHandler {
            metrics: self.metrics.clone(),
            inner,
        })
    }
}

struct MetricsHandler {
    metrics: Arc<Metrics>,
    inner: BoxHandler,
}

impl Handler for MetricsHandler {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        sink: &'a mut ResponseSink,
        req: axum::extract::Request,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let _in_flight = self.metrics.begin();
            let result = self.inner.call(ctx, sink, req).await;
            if result.is_err() {
                self.metrics.record_error();
            }
            result
        })
    }
}

/// Installs the Prometheus recorder and spawns its upkeep task.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            upkeep_handle.run_upkeep();
        }
    });

    Ok(handle)
}

#[derive(Debug, Serialize)]
struct DebugVars {
    build: &'static str,
    #[serde(flatten)]
    metrics: MetricsSnapshot,
}

/// Router for the debug listener. Not part of the request pipeline.
pub fn debug_router(metrics: Arc<Metrics>, prometheus: Option<PrometheusHandle>) -> Router {
    let router = Router::new().route(
        "/debug/vars",
        get(move || {
            let metrics = metrics.clone();
            async move {
                Json(DebugVars {
                    build: env!("CARGO_PKG_VERSION"),
                    metrics: metrics.snapshot(),
                })
            }
        }),
    );

    match prometheus {
        Some(handle) => router.route("/metrics", get(move || async move { handle.render() })),
        None => router,
    }
}
