//! Query metrics, exposed in Prometheus format when an exporter is installed.
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Installs the Prometheus exporter on `addr`
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

/// Record a completed query of the given kind
pub fn record_query(kind: &'static str, duration_ms: f64) {
    counter!("obsquery.query.count", "kind" => kind).increment(1);
    histogram!("obsquery.query.duration_ms", "kind" => kind).record(duration_ms);
}

pub fn record_query_failure(kind: &'static str) {
    counter!("obsquery.query.failures", "kind" => kind).increment(1);
}

/// Record rows returned by one statement
pub fn record_rows(intent: &'static str, rows: usize) {
    counter!("obsquery.store.rows", "intent" => intent).increment(rows as u64);
}

pub fn record_groups(groups: usize) {
    histogram!("obsquery.grouping.groups").record(groups as f64);
}
