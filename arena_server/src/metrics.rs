//! Prometheus metrics for monitoring arena health.
//!
//! The arena library records counters through the `metrics` facade; this
//! module installs the Prometheus exporter that serves them and keeps a few
//! process-level gauges current.
//!
//! # Metrics
//!
//! - **Sessions**: `arena_sessions_created_total`, `arena_match_failures_total`
//! - **Tables**: `arena_tables_opened_total`, `arena_tables_closed_total`, `arena_live_tables`
//! - **Play**: `arena_actions_accepted_total`, `arena_actions_rejected_total`,
//!   `arena_hands_settled_total`
//! - **Connections**: `arena_reconnect_grace_total`, `arena_forfeits_total`
//! - **Replay**: `arena_replay_write_failures_total`

use metrics::{Unit, describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;
    describe_metrics();
    Ok(())
}

/// Register help text for every arena metric
pub fn describe_metrics() {
    describe_counter!(
        "arena_sessions_created_total",
        Unit::Count,
        "Sessions created (waiting or seated)"
    );
    describe_counter!(
        "arena_match_failures_total",
        Unit::Count,
        "Matches rolled back because the table could not be persisted"
    );
    describe_counter!("arena_tables_opened_total", Unit::Count, "Tables opened");
    describe_counter!("arena_tables_closed_total", Unit::Count, "Tables closed, by reason");
    describe_counter!(
        "arena_actions_accepted_total",
        Unit::Count,
        "Actions applied by the rules engine"
    );
    describe_counter!(
        "arena_actions_rejected_total",
        Unit::Count,
        "Actions rejected, by reason"
    );
    describe_counter!("arena_hands_settled_total", Unit::Count, "Hands settled");
    describe_counter!(
        "arena_reconnect_grace_total",
        Unit::Count,
        "Reconnect grace periods started"
    );
    describe_counter!("arena_forfeits_total", Unit::Count, "Tables ended by forfeit");
    describe_counter!(
        "arena_replay_write_failures_total",
        Unit::Count,
        "Replay events or snapshots that failed to persist"
    );
    describe_gauge!("arena_live_tables", Unit::Count, "Tables currently in play");
}

/// Set current live table count.
pub fn live_tables(count: usize) {
    metrics::gauge!("arena_live_tables").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter() {
        // Without an installed recorder these are no-ops
        describe_metrics();
        live_tables(3);
    }
}
