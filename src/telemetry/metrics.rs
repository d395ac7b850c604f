//! Metric instrument factories for workpool.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments come from the `"workpool"` meter. Without a configured
//! provider they are no-ops.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for workpool instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("workpool")
}

/// Counter: tasks accepted into the queue.
pub fn tasks_submitted() -> Counter<u64> {
    meter()
        .u64_counter("workpool.tasks.submitted")
        .with_description("Number of tasks accepted into the queue")
        .build()
}

/// Counter: tasks whose handler returned `Ok`.
pub fn tasks_completed() -> Counter<u64> {
    meter()
        .u64_counter("workpool.tasks.completed")
        .with_description("Number of tasks completed successfully")
        .build()
}

/// Counter: tasks whose handler returned an error or panicked.
/// Labels: `panicked` ("true" | "false").
pub fn tasks_failed() -> Counter<u64> {
    meter()
        .u64_counter("workpool.tasks.failed")
        .with_description("Number of tasks that failed")
        .build()
}

/// Counter: tasks still queued when cancellation fired.
pub fn tasks_dropped() -> Counter<u64> {
    meter()
        .u64_counter("workpool.tasks.dropped")
        .with_description("Number of queued tasks dropped on cancellation")
        .build()
}

/// Histogram: task handler duration in milliseconds.
/// Labels: `outcome` ("completed" | "failed").
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("workpool.task.duration_ms")
        .with_description("Task handler duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: shutdowns that hit their deadline with workers still alive.
pub fn shutdown_timeouts() -> Counter<u64> {
    meter()
        .u64_counter("workpool.shutdown.timeouts")
        .with_description("Number of shutdowns that timed out")
        .build()
}

/// The instruments a pool records into, built once per pool.
#[derive(Clone)]
pub struct PoolInstruments {
    submitted: Counter<u64>,
    completed: Counter<u64>,
    failed: Counter<u64>,
    dropped: Counter<u64>,
    duration: Histogram<f64>,
    shutdown_timeouts: Counter<u64>,
}

impl PoolInstruments {
    pub fn new() -> Self {
        Self {
            submitted: tasks_submitted(),
            completed: tasks_completed(),
            failed: tasks_failed(),
            dropped: tasks_dropped(),
            duration: task_duration_ms(),
            shutdown_timeouts: shutdown_timeouts(),
        }
    }

    pub fn record_submitted(&self) {
        self.submitted.add(1, &[]);
    }

    pub fn record_completed(&self, duration_ms: u64) {
        self.completed.add(1, &[]);
        self.duration.record(
            duration_ms as f64,
            &[KeyValue::new("outcome", "completed")],
        );
    }

    pub fn record_failed(&self, duration_ms: u64, panicked: bool) {
        self.failed
            .add(1, &[KeyValue::new("panicked", panicked.to_string())]);
        self.duration
            .record(duration_ms as f64, &[KeyValue::new("outcome", "failed")]);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.add(count, &[]);
    }

    pub fn record_shutdown_timeout(&self) {
        self.shutdown_timeouts.add(1, &[]);
    }
}

impl Default for PoolInstruments {
    fn default() -> Self {
        Self::new()
    }
}
