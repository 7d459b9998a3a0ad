//! Metrics collection and exposition.
//!
//! # Metrics
//! - `castlab_funding_steps_total` (counter): submitted steps by kind
//! - `castlab_funding_failures_total` (counter): failed steps by kind
//! - `castlab_funding_complete_total` (counter): completed fund sequences
//! - `castlab_flow_timeouts_total` (counter): single-step flow timeouts
//! - `castlab_settle_reads_total` (counter): post-deposit settle re-reads
//! - `castlab_chain_healthy` (gauge): 1=reachable, 0=unreachable
//! - `castlab_catalog_size` (gauge): listed experiments

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

pub fn record_funding_step(step: &'static str) {
    counter!("castlab_funding_steps_total", "step" => step).increment(1);
}

pub fn record_funding_failure(step: &'static str) {
    counter!("castlab_funding_failures_total", "step" => step).increment(1);
}

pub fn record_funding_complete() {
    counter!("castlab_funding_complete_total").increment(1);
}

pub fn record_flow_timeout(kind: &'static str) {
    counter!("castlab_flow_timeouts_total", "kind" => kind).increment(1);
}

pub fn record_settle_read(experiment_id: u64) {
    tracing::debug!(experiment_id, "Settle re-read refreshed chain totals");
    counter!("castlab_settle_reads_total").increment(1);
}

pub fn record_chain_health(healthy: bool) {
    gauge!("castlab_chain_healthy").set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_catalog_size(size: usize) {
    gauge!("castlab_catalog_size").set(size as f64);
}
