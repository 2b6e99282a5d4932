//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pipeline metrics (chains, filters, servlets, failures, pool)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `pipeline_chains_built_total` (counter): chains populated for a dispatch
//! - `pipeline_chain_length` (histogram): filters per populated chain
//! - `pipeline_filter_invocations_total` (counter): by filter name
//! - `pipeline_servlet_invocations_total` (counter)
//! - `pipeline_chain_failures_total` (counter): by failure kind
//! - `pipeline_pool_acquire_total` (counter): by outcome (hit, miss)
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels are bounded: filter names come from configuration

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime; the listener is spawned on it.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_chain_built(filters: usize) {
    ::metrics::counter!("pipeline_chains_built_total").increment(1);
    ::metrics::histogram!("pipeline_chain_length").record(filters as f64);
}

pub fn record_filter_invocation(filter: &str) {
    ::metrics::counter!("pipeline_filter_invocations_total", "filter" => filter.to_string()).increment(1);
}

pub fn record_servlet_invocation() {
    ::metrics::counter!("pipeline_servlet_invocations_total").increment(1);
}

pub fn record_chain_failure(kind: &'static str) {
    ::metrics::counter!("pipeline_chain_failures_total", "kind" => kind).increment(1);
}

pub fn record_pool(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    ::metrics::counter!("pipeline_pool_acquire_total", "outcome" => outcome).increment(1);
}
