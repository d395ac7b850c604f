//! Read-only counters exposed for metrics and logging collaborators.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Live counters shared between the controller and its workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub active_workers: AtomicUsize,
    pub busy_workers: AtomicUsize,
    pub tasks_submitted: AtomicU64,
    pub tasks_completed: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub tasks_dropped: AtomicU64,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self, queue_depth: usize) -> PoolStats {
        PoolStats {
            active_workers: self.active_workers.load(Ordering::Acquire),
            busy_workers: self.busy_workers.load(Ordering::Relaxed),
            queue_depth,
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_dropped: self.tasks_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Workers whose run loop has not returned yet.
    pub active_workers: usize,
    /// Workers currently executing a task.
    pub busy_workers: usize,
    pub queue_depth: usize,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_dropped: u64,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "workers={} busy={} queued={} submitted={} completed={} failed={} dropped={}",
            self.active_workers,
            self.busy_workers,
            self.queue_depth,
            self.tasks_submitted,
            self.tasks_completed,
            self.tasks_failed,
            self.tasks_dropped
        )
    }
}
