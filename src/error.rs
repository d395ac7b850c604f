//! Error types for workpool.

use std::time::Duration;

use thiserror::Error;

use crate::model::{PoolState, TaskId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("pool is not running (state: {state})")]
    PoolNotRunning { state: PoolState },

    #[error("pool is shutting down")]
    PoolShuttingDown,

    #[error("shutdown timed out after {timeout:?} with {active_workers} worker(s) still running")]
    ShutdownTimedOut {
        timeout: Duration,
        active_workers: usize,
    },

    #[error("task {id} failed: {reason}")]
    TaskFailed { id: TaskId, reason: String },

    #[error("task {0} was dropped before it ran")]
    TaskDropped(TaskId),

    #[error("pool already started")]
    AlreadyStarted,

    #[error("task queue is full")]
    QueueFull,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
