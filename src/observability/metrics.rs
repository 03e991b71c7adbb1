//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_admitted_total` (counter): admitted requests by bucket
//! - `gate_rate_limited_total` (counter): rejected requests by bucket
//! - `gate_cache_hits_total` / `gate_cache_misses_total` (counters)
//! - `gate_cache_evictions_total` (counter): expired or capacity removals
//! - `gate_cache_entries` (gauge): current entry count
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing when metrics are disabled.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admitted(bucket: &'static str) {
    ::metrics::counter!("gate_requests_admitted_total", "bucket" => bucket).increment(1);
}

pub fn record_rate_limited(bucket: &'static str) {
    ::metrics::counter!("gate_rate_limited_total", "bucket" => bucket).increment(1);
}

pub fn record_cache_hit() {
    ::metrics::counter!("gate_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    ::metrics::counter!("gate_cache_misses_total").increment(1);
}

pub fn record_cache_evictions(count: u64) {
    ::metrics::counter!("gate_cache_evictions_total").increment(count);
}

pub fn record_cache_size(entries: usize) {
    ::metrics::gauge!("gate_cache_entries").set(entries as f64);
}
