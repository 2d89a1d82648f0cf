//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of transactions accepted into the local mempool.
    pub transactions_submitted_total: IntCounter,
    /// Total number of inbound state updates that replaced the chain.
    pub chain_updates_applied_total: IntCounter,
    /// Total number of peer registrations accepted.
    pub peers_registered_total: IntCounter,
    /// Current number of transactions waiting in the mempool.
    pub transactions_in_mempool: IntGauge,
    /// Number of peers in the registry.
    pub known_peers: IntGauge,
    /// Current chain length in blocks.
    pub chain_height: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("ember".into()), None)
            .expect("failed to create prometheus registry");

        let transactions_submitted_total = IntCounter::new(
            "transactions_submitted_total",
            "Total number of transactions accepted into the mempool",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_submitted_total.clone()))
            .expect("metric registration");

        let chain_updates_applied_total = IntCounter::new(
            "chain_updates_applied_total",
            "Total number of inbound state updates that replaced the chain",
        )
        .expect("metric creation");
        registry
            .register(Box::new(chain_updates_applied_total.clone()))
            .expect("metric registration");

        let peers_registered_total = IntCounter::new(
            "peers_registered_total",
            "Total number of peer registrations accepted",
        )
        .expect("metric creation");
        registry
            .register(Box::new(peers_registered_total.clone()))
            .expect("metric registration");

        let transactions_in_mempool = IntGauge::new(
            "transactions_in_mempool",
            "Current number of pending transactions in the mempool",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_in_mempool.clone()))
            .expect("metric registration");

        let known_peers = IntGauge::new("known_peers", "Number of peers in the registry")
            .expect("metric creation");
        registry
            .register(Box::new(known_peers.clone()))
            .expect("metric registration");

        let chain_height = IntGauge::new("chain_height", "Current chain length in blocks")
            .expect("metric creation");
        registry
            .register(Box::new(chain_height.clone()))
            .expect("metric registration");

        Self {
            registry,
            transactions_submitted_total,
            chain_updates_applied_total,
            peers_registered_total,
            transactions_in_mempool,
            known_peers,
            chain_height,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_encode_contains_registered_names() {
        let metrics = NodeMetrics::new();
        metrics.transactions_submitted_total.inc();
        metrics.chain_height.set(3);
        let body = metrics.encode().unwrap();
        assert!(body.contains("ember_transactions_submitted_total"));
        assert!(body.contains("ember_chain_height"));
    }
}
