//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Describe the cluster's metrics once at startup
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//! - Thin recording helpers so call sites stay one line
//!
//! # Metrics
//! - `kv_requests_total` (counter): requests handled by a node, by action and outcome
//! - `kv_request_duration_seconds` (histogram): node-side handling latency
//! - `kv_forwards_total` (counter): balancer forwards, by backend and outcome
//! - `kv_forward_duration_seconds` (histogram): balancer round trip per forward
//! - `kv_health_probes_total` (counter): probes by observer, peer and result
//! - `kv_healthy_members` (gauge): members an observer currently routes to
//! - `kv_sync_pushes_total` (counter): snapshot pushes by node, peer and outcome
//! - `kv_store_keys` (gauge): keys held by a node
//!
//! Without an installed recorder every helper is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Install the Prometheus exporter on `addr` and describe all metrics.
///
/// Failure to install is logged, not fatal: the cluster runs without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!("kv_requests_total", "Requests handled by a storage node");
    describe_histogram!(
        "kv_request_duration_seconds",
        "Time a storage node spent handling one request"
    );
    describe_counter!("kv_forwards_total", "Requests forwarded by the balancer");
    describe_histogram!(
        "kv_forward_duration_seconds",
        "Balancer round trip to a backend"
    );
    describe_counter!("kv_health_probes_total", "Health probes sent");
    describe_gauge!(
        "kv_healthy_members",
        "Members currently considered healthy by an observer"
    );
    describe_counter!("kv_sync_pushes_total", "Snapshot pushes to peers");
    describe_gauge!("kv_store_keys", "Keys held in a node's store");
}

pub fn record_request(node: &str, action: &str, ok: bool, start: Instant) {
    counter!(
        "kv_requests_total",
        "node" => node.to_string(),
        "action" => action.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
    histogram!("kv_request_duration_seconds", "action" => action.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_forward(backend: &str, ok: bool, start: Instant) {
    counter!(
        "kv_forwards_total",
        "backend" => backend.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
    histogram!("kv_forward_duration_seconds", "backend" => backend.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_probe(observer: &str, peer: &str, healthy: bool) {
    counter!(
        "kv_health_probes_total",
        "observer" => observer.to_string(),
        "peer" => peer.to_string(),
        "result" => if healthy { "healthy" } else { "unhealthy" }
    )
    .increment(1);
}

pub fn set_healthy_members(observer: &str, count: usize) {
    gauge!("kv_healthy_members", "observer" => observer.to_string()).set(count as f64);
}

pub fn record_sync(node: &str, peer: &str, ok: bool) {
    counter!(
        "kv_sync_pushes_total",
        "node" => node.to_string(),
        "peer" => peer.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

pub fn set_store_keys(node: &str, keys: usize) {
    gauge!("kv_store_keys", "node" => node.to_string()).set(keys as f64);
}
