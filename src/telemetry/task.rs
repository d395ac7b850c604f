//! Task execution span helpers.
//!
//! Provides span creation and outcome recording for tasks flowing through
//! the pool's workers.

use tracing::Span;

use crate::model::TaskId;

/// Start a span for one task execution on one worker.
///
/// The `task.outcome` field is declared empty and filled in by
/// [`record_outcome`].
pub fn start_task_span(worker_id: usize, task_id: &TaskId) -> Span {
    tracing::info_span!(
        "task.execute",
        "task.id" = %task_id,
        "worker.id" = worker_id,
        "task.outcome" = tracing::field::Empty,
        "task.duration_ms" = tracing::field::Empty,
    )
}

/// Record how the task ended on its span.
pub fn record_outcome(span: &Span, outcome: &str, duration_ms: u64) {
    span.record("task.outcome", outcome);
    span.record("task.duration_ms", duration_ms);
}
