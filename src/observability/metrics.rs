//! Metrics collection.
//!
//! # Metrics
//! - `pool_acquires_total` (counter): successful checkouts
//! - `pool_acquire_timeouts_total` (counter): acquires that hit the deadline
//! - `pool_connections_opened_total` / `pool_connections_closed_total`
//! - `pool_failovers_total` (counter): promotions of a new active target
//! - `export_runs_total` (counter): by table and outcome
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations behind the `metrics` facade)
//! - No exporter here; the embedding process installs a recorder if it wants
//!   exposition

use metrics::counter;

pub fn record_acquire() {
    counter!("pool_acquires_total").increment(1);
}

pub fn record_acquire_timeout() {
    counter!("pool_acquire_timeouts_total").increment(1);
}

pub fn record_connection_opened() {
    counter!("pool_connections_opened_total").increment(1);
}

pub fn record_connection_closed() {
    counter!("pool_connections_closed_total").increment(1);
}

pub fn record_failover() {
    counter!("pool_failovers_total").increment(1);
}

pub fn record_export(table: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("export_runs_total", "table" => table.to_string(), "outcome" => outcome).increment(1);
}
