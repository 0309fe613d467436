//! # Prometheus Metrics
//!
//! Counters for built redirects, handled callbacks and published events,
//! plus a callback latency histogram. Rendered at `/metrics`.
//!
//! Everything lives in a dedicated [`prometheus::Registry`] with the
//! `banklink` prefix.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use banklink::{BanklinkEvent, Notifier};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metric handles for the host.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Redirect forms built, by `kind` (payment, auth) and `bank`.
    pub requests_built_total: IntCounterVec,
    /// Callbacks received, by `kind` and `outcome` (applied, duplicate or
    /// an error kind such as `authentication`).
    pub callbacks_total: IntCounterVec,
    /// Notification events, by `event` name.
    pub events_total: IntCounterVec,
    /// Time spent verifying and applying one callback.
    pub callback_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("banklink".into()), None)?;

        let requests_built_total = IntCounterVec::new(
            Opts::new("requests_built_total", "Signed redirect forms built"),
            &["kind", "bank"],
        )?;
        registry.register(Box::new(requests_built_total.clone()))?;

        let callbacks_total = IntCounterVec::new(
            Opts::new("callbacks_total", "Bank callbacks received, by outcome"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(callbacks_total.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("events_total", "Record lifecycle events published"),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let callback_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "callback_latency_seconds",
                "Callback verification and state update latency in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]),
        )?;
        registry.register(Box::new(callback_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_built_total,
            callbacks_total,
            events_total,
            callback_latency_seconds,
        })
    }

    pub fn request_built(&self, kind: &str, bank: &str) {
        self.requests_built_total.with_label_values(&[kind, bank]).inc();
    }

    pub fn callback(&self, kind: &str, outcome: &str) {
        self.callbacks_total.with_label_values(&[kind, outcome]).inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Notifier for NodeMetrics {
    fn notify(&self, event: &BanklinkEvent) {
        self.events_total.with_label_values(&[event.name()]).inc();
    }
}

/// Shared metrics handle for axum state.
pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
