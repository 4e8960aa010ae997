use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── Scheduler ───────────────────────────────────────────────────

/// Counter: booking attempts. Labels: status (ok | conflict).
pub const BOOKINGS_TOTAL: &str = "shiftcheck_bookings_total";

/// Histogram: time spent inside the booking critical section, in seconds.
pub const BOOK_DURATION_SECONDS: &str = "shiftcheck_book_duration_seconds";

// ── Reconciliation ──────────────────────────────────────────────

/// Counter: keys with both an event and a submission.
pub const RECONCILE_MATCHED_TOTAL: &str = "shiftcheck_reconcile_matched_total";

/// Counter: one-sided keys. Labels: side (event | submission).
pub const RECONCILE_UNMATCHED_TOTAL: &str = "shiftcheck_reconcile_unmatched_total";

/// Counter: records replaced by a later record with the same key. Labels: side.
pub const RECONCILE_SUPERSEDED_TOTAL: &str = "shiftcheck_reconcile_superseded_total";

/// Histogram: reconciliation run time in seconds.
pub const RECONCILE_DURATION_SECONDS: &str = "shiftcheck_reconcile_duration_seconds";

// ── Sources ─────────────────────────────────────────────────────

/// Counter: input records dropped as malformed. Labels: source (event | submission).
pub const RECORDS_MALFORMED_TOTAL: &str = "shiftcheck_records_malformed_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
