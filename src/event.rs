//! Structured events emitted by the pool for every task outcome.
//!
//! Callers that care about per-task results install an event channel with
//! [`Pool::with_events`](crate::pool::Pool::with_events). Events are the
//! pool's voice; tracing logs are the operator's.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::model::TaskId;

/// A structured event emitted by the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// The task this event is about.
    pub task_id: TaskId,
    /// What happened.
    pub kind: TaskEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEventKind {
    Completed {
        worker_id: usize,
        duration_ms: u64,
    },
    Failed {
        worker_id: usize,
        error: String,
        panicked: bool,
        duration_ms: u64,
    },
    /// Still queued when cancellation fired; never ran.
    Dropped { reason: String },
}

impl TaskEvent {
    /// Did the task run to completion?
    pub fn is_success(&self) -> bool {
        matches!(self.kind, TaskEventKind::Completed { .. })
    }

    /// Convert the outcome into the crate's error taxonomy.
    pub fn into_result(self) -> Result<()> {
        match self.kind {
            TaskEventKind::Completed { .. } => Ok(()),
            TaskEventKind::Failed { error, .. } => Err(Error::TaskFailed {
                id: self.task_id,
                reason: error,
            }),
            TaskEventKind::Dropped { .. } => Err(Error::TaskDropped(self.task_id)),
        }
    }
}

/// Fan-out point for task events. Silent when the caller installed no channel.
#[derive(Debug, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<TaskEvent>>,
    seq: AtomicU64,
}

impl EventSink {
    pub fn new(tx: Option<mpsc::UnboundedSender<TaskEvent>>) -> Self {
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    pub fn emit(&self, task_id: TaskId, kind: TaskEventKind) {
        let Some(ref tx) = self.tx else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let event = TaskEvent {
            seq,
            timestamp: Utc::now(),
            task_id,
            kind,
        };
        // A dropped receiver just means nobody is listening anymore.
        let _ = tx.send(event);
    }
}
