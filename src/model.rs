//! Core data model.
//!
//! A task is an opaque unit of work: an identifier, a payload the pool never
//! interprets, and a handler that runs exactly once on some worker.

use std::future::Future;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Newtype for task IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

type Handler = Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// A unit of work submitted to the pool. Immutable once enqueued.
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,

    /// Arbitrary data for the handler. The pool doesn't interpret it.
    pub payload: serde_json::Value,

    handler: Handler,
}

impl Task {
    /// Create a task from a payload and an async handler.
    ///
    /// The handler receives a [`TaskContext`] carrying the payload and a
    /// cancellation token it should observe to be interruptible.
    pub fn new<F, Fut>(payload: serde_json::Value, handler: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: TaskId::new(),
            payload,
            handler: Box::new(move |ctx| handler(ctx).boxed()),
        }
    }

    /// Create a task with no payload.
    pub fn from_fn<F, Fut>(handler: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(serde_json::Value::Null, handler)
    }

    /// Consume the task, producing the handler future for the given context.
    pub(crate) fn run(self, ctx: TaskContext) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.handler)(ctx)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Per-task execution context handed to a task handler.
///
/// The token is a child of the pool's cancellation signal: it fires when the
/// pool cancels, or earlier when the task exceeds its configured timeout.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: TaskId,
    pub worker_id: usize,
    pub payload: serde_json::Value,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        task_id: TaskId,
        worker_id: usize,
        payload: serde_json::Value,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id,
            worker_id,
            payload,
            cancel,
        }
    }

    /// Has this task been asked to stop?
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once this task has been asked to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The underlying token, for handlers that pass it further down.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ---------------------------------------------------------------------------
// Pool state
// ---------------------------------------------------------------------------

/// Lifecycle state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Constructed, no workers yet.
    Created,
    /// Workers running, accepting tasks.
    Running,
    /// Shutdown requested, waiting for workers to exit.
    Draining,
    /// Every worker has exited. Terminal.
    Stopped,
}

impl PoolState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: PoolState) -> bool {
        use PoolState::*;
        matches!(
            (self, to),
            (Created, Running)
                | (Created, Stopped)    // shut down before start
                | (Running, Draining)
                | (Draining, Stopped)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, PoolState::Stopped)
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::Draining => "draining",
            PoolState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PoolState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PoolState::Created),
            "running" => Ok(PoolState::Running),
            "draining" => Ok(PoolState::Draining),
            "stopped" => Ok(PoolState::Stopped),
            other => Err(format!("unknown pool state: {other}")),
        }
    }
}
