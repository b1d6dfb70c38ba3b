//! # Prometheus Metrics
//!
//! Exposes operational metrics for the ledger node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Ledger operations served, by operation and outcome (`ok` / `error`).
    pub operations_total: IntCounterVec,
    /// Ledger errors returned to clients, by error code.
    pub errors_total: IntCounterVec,
    /// Accounts created (bearer and issuer).
    pub accounts_created_total: IntCounter,
    /// Currencies issued.
    pub currencies_issued_total: IntCounter,
    /// Transfers cleared on both legs.
    pub transfers_cleared_total: IntCounter,
    /// Time from receiving a transfer request to a final outcome, in seconds.
    pub transfer_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("tally".into()), None)
            .expect("failed to create prometheus registry");

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Ledger operations served, by outcome"),
            &["operation", "outcome"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operations_total.clone()))
            .expect("metric registration");

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Ledger errors returned to clients, by code"),
            &["code"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("metric registration");

        let accounts_created_total =
            IntCounter::new("accounts_created_total", "Total number of accounts created")
                .expect("metric creation");
        registry
            .register(Box::new(accounts_created_total.clone()))
            .expect("metric registration");

        let currencies_issued_total =
            IntCounter::new("currencies_issued_total", "Total number of currencies issued")
                .expect("metric creation");
        registry
            .register(Box::new(currencies_issued_total.clone()))
            .expect("metric registration");

        let transfers_cleared_total = IntCounter::new(
            "transfers_cleared_total",
            "Total number of transfers cleared on both legs",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transfers_cleared_total.clone()))
            .expect("metric registration");

        let transfer_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "transfer_latency_seconds",
                "Transfer request processing latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(transfer_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            operations_total,
            errors_total,
            accounts_created_total,
            currencies_issued_total,
            transfers_cleared_total,
            transfer_latency_seconds,
        }
    }

    /// Count one served operation.
    pub fn observe_outcome(&self, operation: &str, error_code: Option<&str>) {
        let outcome = if error_code.is_some() { "error" } else { "ok" };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        if let Some(code) = error_code {
            self.errors_total.with_label_values(&[code]).inc();
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
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
