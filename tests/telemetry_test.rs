//! Integration tests for telemetry initialization and span helpers.

use workpool::TaskId;
use workpool::telemetry::metrics::PoolInstruments;
use workpool::telemetry::task::{record_outcome, start_task_span};

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    let config = workpool::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "workpool-test".to_string(),
        log_level: "debug".to_string(),
    };
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    if let Ok(guard) = workpool::telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn task_span_creates_and_records_outcome() {
    let span = start_task_span(0, &TaskId::new());
    record_outcome(&span, "completed", 12);
}

#[test]
fn instruments_record_without_a_provider() {
    let instruments = PoolInstruments::new();
    instruments.record_submitted();
    instruments.record_completed(5);
    instruments.record_failed(7, true);
    instruments.record_dropped(3);
    instruments.record_shutdown_timeout();
}
