//! Worker run loop: dequeue, execute, repeat until cancelled or closed.
//!
//! A task handler that errors or panics is recorded as a failure and the
//! worker moves on to the next task. Nothing a handler does can end the
//! worker's loop early.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use futures::FutureExt as _;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::event::{EventSink, TaskEventKind};
use crate::model::{Task, TaskContext, TaskId};
use crate::telemetry::metrics::PoolInstruments;
use crate::telemetry::task::{record_outcome, start_task_span};

use super::queue::{Dequeued, TaskQueue};
use super::signal::CancellationSignal;
use super::stats::Counters;

/// How a handler ended: its own result, or the message of the panic it raised.
type HandlerOutcome = std::result::Result<anyhow::Result<()>, String>;

/// One worker. Holds references to the shared queue and signal, nothing else
/// shared beyond the counters it reports into.
pub(crate) struct Worker {
    pub id: usize,
    pub queue: Arc<TaskQueue>,
    pub signal: CancellationSignal,
    pub counters: Arc<Counters>,
    pub events: Arc<EventSink>,
    pub instruments: PoolInstruments,
    pub task_timeout: Option<Duration>,
}

/// Decrements the live-worker count when the run loop returns.
struct ExitGuard {
    worker_id: usize,
    counters: Arc<Counters>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let remaining = self.counters.active_workers.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!(worker_id = self.worker_id, remaining, "worker exited");
    }
}

impl Worker {
    /// Run until the signal fires or the queue is closed and drained.
    ///
    /// The caller must already have counted this worker in `active_workers`.
    pub async fn run(self) {
        let _exit = ExitGuard {
            worker_id: self.id,
            counters: Arc::clone(&self.counters),
        };

        debug!(worker_id = self.id, "worker started");

        loop {
            match self.queue.dequeue().await {
                Dequeued::Task(task) => self.execute(task).await,
                Dequeued::Cancelled => {
                    info!(worker_id = self.id, "worker observed cancellation, stopping");
                    break;
                }
                Dequeued::Closed => {
                    info!(worker_id = self.id, "queue closed and empty, stopping");
                    break;
                }
            }
        }
    }

    async fn execute(&self, task: Task) {
        let task_id = task.id;
        let span = start_task_span(self.id, &task_id);
        let token = self.signal.child_token();
        let ctx = TaskContext::new(task_id, self.id, task.payload.clone(), token.clone());

        self.counters.busy_workers.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let outcome = self
            .supervise(task.run(ctx), &token)
            .instrument(span.clone())
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        self.counters.busy_workers.fetch_sub(1, Ordering::Relaxed);
        // Detach the child token from the pool signal.
        token.cancel();

        match outcome {
            Ok(Ok(())) => {
                record_outcome(&span, "completed", duration_ms);
                span.in_scope(|| debug!(duration_ms, "task completed"));
                Counters::incr(&self.counters.tasks_completed);
                self.instruments.record_completed(duration_ms);
                self.events.emit(
                    task_id,
                    TaskEventKind::Completed {
                        worker_id: self.id,
                        duration_ms,
                    },
                );
            }
            Ok(Err(e)) => {
                record_outcome(&span, "failed", duration_ms);
                span.in_scope(|| warn!(duration_ms, error = %e, "task failed"));
                self.record_failure(task_id, format!("{e:#}"), false, duration_ms);
            }
            Err(panic) => {
                record_outcome(&span, "panicked", duration_ms);
                span.in_scope(|| warn!(duration_ms, panic = %panic, "task panicked"));
                self.record_failure(task_id, panic, true, duration_ms);
            }
        }
    }

    /// Drive the handler to completion, catching panics.
    ///
    /// With a task timeout, the task's token is cancelled once the limit
    /// elapses and the handler is still awaited: it is asked to stop, never
    /// torn down mid-flight.
    async fn supervise(
        &self,
        fut: BoxFuture<'static, anyhow::Result<()>>,
        token: &CancellationToken,
    ) -> HandlerOutcome {
        let mut run = AssertUnwindSafe(fut).catch_unwind();

        let Some(limit) = self.task_timeout else {
            return run.await.map_err(panic_message);
        };

        tokio::select! {
            out = &mut run => out.map_err(panic_message),
            _ = tokio::time::sleep(limit) => {
                warn!(
                    worker_id = self.id,
                    timeout_ms = limit.as_millis() as u64,
                    "task exceeded its timeout, cancelling its context"
                );
                token.cancel();
                run.await.map_err(panic_message)
            }
        }
    }

    fn record_failure(
        &self,
        task_id: TaskId,
        error: String,
        panicked: bool,
        duration_ms: u64,
    ) {
        Counters::incr(&self.counters.tasks_failed);
        self.instruments.record_failed(duration_ms, panicked);
        self.events.emit(
            task_id,
            TaskEventKind::Failed {
                worker_id: self.id,
                error,
                panicked,
                duration_ms,
            },
        );
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}
