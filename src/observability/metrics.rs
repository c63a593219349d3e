//! Metrics collection and exposition.
//!
//! # Metrics
//! - `<ns>_distributor_pushes_total` (counter): pushes by outcome
//! - `<ns>_distributor_spans_received_total` (counter)
//! - `<ns>_ingester_live_traces` (gauge): live traces across tenants
//! - `<ns>_querier_queries_total` (counter): trace lookups by outcome
//! - `<ns>_querier_query_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - One Prometheus recorder per process, installed on first use
//! - Namespace fixed by the first caller; later namespaces are ignored

use std::sync::OnceLock;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static RECORDER: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
static NAMESPACE: OnceLock<String> = OnceLock::new();

/// Install the Prometheus recorder (once) and return a render handle.
pub fn init(namespace: &str) -> Option<PrometheusHandle> {
    RECORDER
        .get_or_init(|| {
            let _ = NAMESPACE.set(namespace.to_string());
            match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => {
                    tracing::info!(namespace, "metrics recorder installed");
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "metrics recorder unavailable");
                    None
                }
            }
        })
        .clone()
}

fn name(suffix: &str) -> String {
    let namespace = NAMESPACE.get().map(String::as_str).unwrap_or("tracestack");
    format!("{namespace}_{suffix}")
}

pub fn record_push(outcome: &'static str, spans: usize) {
    metrics::counter!(name("distributor_pushes_total"), "outcome" => outcome).increment(1);
    if outcome == "success" {
        metrics::counter!(name("distributor_spans_received_total")).increment(spans as u64);
    }
}

pub fn record_live_traces(count: usize) {
    metrics::gauge!(name("ingester_live_traces")).set(count as f64);
}

pub fn record_query(outcome: &'static str, start: Instant) {
    metrics::counter!(name("querier_queries_total"), "outcome" => outcome).increment(1);
    metrics::histogram!(name("querier_query_duration_seconds"))
        .record(start.elapsed().as_secs_f64());
}
