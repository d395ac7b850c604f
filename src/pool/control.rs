//! Lifecycle controller: owns the queue, the cancellation signal and the
//! completion barrier, and walks the pool through
//! `Created -> Running -> Draining -> Stopped`.
//!
//! Shutdown is cooperative. The controller can close the queue and fire the
//! signal, but it never aborts a handler that is already running; a task that
//! ignores its context keeps its worker alive past any deadline. A timed-out
//! shutdown leaves the pool `Draining`, and it reaches `Stopped` on its own
//! once the last worker returns.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::{PoolConfig, ShutdownMode};
use crate::error::{Error, Result};
use crate::event::{EventSink, TaskEvent, TaskEventKind};
use crate::model::{PoolState, Task, TaskId};
use crate::telemetry::metrics::PoolInstruments;

use super::queue::TaskQueue;
use super::signal::CancellationSignal;
use super::stats::{Counters, PoolStats};
use super::worker::Worker;

/// Handle to a worker pool. Cheap to clone; every clone drives the same pool.
///
/// When the last handle is dropped without a shutdown, the cancellation
/// signal fires so that no worker outlives its pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
    _cancel_on_drop: Arc<CancelOnDrop>,
}

struct PoolInner {
    config: PoolConfig,
    queue: Arc<TaskQueue>,
    signal: CancellationSignal,
    /// Completion barrier: closed once every worker is spawned, empty once
    /// every worker has returned.
    tracker: TaskTracker,
    counters: Arc<Counters>,
    events: Arc<EventSink>,
    instruments: PoolInstruments,
    state: watch::Sender<PoolState>,
}

struct CancelOnDrop(CancellationSignal);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl Pool {
    /// Create a pool. No workers run until [`start`](Self::start).
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a pool that reports every task outcome on `events`.
    pub fn with_events(config: PoolConfig, events: mpsc::UnboundedSender<TaskEvent>) -> Result<Self> {
        Self::build(config, Some(events))
    }

    fn build(config: PoolConfig, events: Option<mpsc::UnboundedSender<TaskEvent>>) -> Result<Self> {
        config.validate()?;

        let signal = CancellationSignal::new();
        let queue = Arc::new(TaskQueue::new(config.queue_capacity, signal.clone()));
        let (state, _) = watch::channel(PoolState::Created);

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                queue,
                signal: signal.clone(),
                tracker: TaskTracker::new(),
                counters: Arc::new(Counters::default()),
                events: Arc::new(EventSink::new(events)),
                instruments: PoolInstruments::new(),
                state,
            }),
            _cancel_on_drop: Arc::new(CancelOnDrop(signal)),
        })
    }

    /// Spawn the workers. Must be called from within a tokio runtime.
    ///
    /// A pool starts once; any later call is a caller bug and fails with
    /// [`Error::AlreadyStarted`].
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.transition(PoolState::Created, PoolState::Running) {
            error!(state = %self.state(), "start called on a pool that was already started");
            return Err(Error::AlreadyStarted);
        }

        for id in 0..inner.config.workers {
            inner.counters.active_workers.fetch_add(1, Ordering::AcqRel);
            let worker = Worker {
                id,
                queue: Arc::clone(&inner.queue),
                signal: inner.signal.clone(),
                counters: Arc::clone(&inner.counters),
                events: Arc::clone(&inner.events),
                instruments: inner.instruments.clone(),
                task_timeout: inner.config.task_timeout,
            };
            inner.tracker.spawn(worker.run());
        }
        // No worker is ever added after this point.
        inner.tracker.close();

        tokio::spawn(Arc::clone(inner).finalize());

        info!(
            workers = inner.config.workers,
            queue_capacity = inner.config.queue_capacity,
            "pool started"
        );
        Ok(())
    }

    /// Enqueue a task, waiting while the queue is full.
    ///
    /// Fails with [`Error::PoolNotRunning`] before `start` or once shutdown
    /// has begun, and with [`Error::PoolShuttingDown`] if shutdown begins
    /// while this call is waiting for space.
    pub async fn submit(&self, task: Task) -> Result<TaskId> {
        self.ensure_running()?;
        let id = task.id;
        let permit = self.inner.queue.reserve().await?;
        // Counted before any worker can see the task.
        self.inner.record_submitted(id);
        permit.send(task);
        Ok(id)
    }

    /// Enqueue a task without waiting. A full queue yields [`Error::QueueFull`].
    pub fn try_submit(&self, task: Task) -> Result<TaskId> {
        self.ensure_running()?;
        let id = task.id;
        let permit = self.inner.queue.try_reserve()?;
        self.inner.record_submitted(id);
        permit.send(task);
        Ok(id)
    }

    /// Stop the pool and wait up to `timeout` for every worker to exit.
    ///
    /// The first call closes the queue. In [`ShutdownMode::Drain`] workers
    /// finish what is already queued; in [`ShutdownMode::Cancel`] the
    /// signal fires at once and queued tasks are reported as dropped. If the
    /// timeout elapses first the signal fires anyway and
    /// [`Error::ShutdownTimedOut`] is returned while the stragglers keep
    /// running. Only the first call has any effect: later and concurrent
    /// calls just wait up to their own `timeout` and report what they saw.
    ///
    /// The timeout is best-effort: a handler that ignores its context cannot
    /// be interrupted.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let inner = &self.inner;
        let initiated = inner.begin_shutdown();
        if initiated && inner.config.shutdown_mode == ShutdownMode::Cancel {
            inner.cancel_and_drop_queued("pool cancelled").await;
        }

        match self.wait_stopped(timeout).await {
            Ok(()) => Ok(()),
            Err(e) if !initiated => Err(e),
            Err(e) => {
                inner.instruments.record_shutdown_timeout();
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    active_workers = inner.counters.active_workers.load(Ordering::Acquire),
                    "shutdown deadline elapsed, cancelling remaining work"
                );
                inner.cancel_and_drop_queued("shutdown deadline elapsed").await;
                Err(e)
            }
        }
    }

    /// Wait up to `timeout` for the pool to reach `Stopped`, without
    /// initiating anything.
    pub async fn wait_stopped(&self, timeout: Duration) -> Result<()> {
        let mut state = self.inner.state.subscribe();
        let stopped = tokio::time::timeout(timeout, async {
            // The sender lives in `inner`, so this only returns once stopped.
            let _ = state.wait_for(|s| s.is_terminal()).await.map(|_| ());
        })
        .await;
        match stopped {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::ShutdownTimedOut {
                timeout,
                active_workers: self.inner.counters.active_workers.load(Ordering::Acquire),
            }),
        }
    }

    pub fn state(&self) -> PoolState {
        *self.inner.state.borrow()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.counters.snapshot(self.inner.queue.len())
    }

    /// Has the pool-wide cancellation signal fired?
    pub fn is_cancelled(&self) -> bool {
        self.inner.signal.is_cancelled()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state() {
            PoolState::Running => Ok(()),
            state => Err(Error::PoolNotRunning { state }),
        }
    }
}

impl PoolInner {
    fn transition(&self, from: PoolState, to: PoolState) -> bool {
        debug_assert!(from.can_transition_to(to));
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Move out of `Running` (or `Created`). Returns `true` for the one
    /// caller that did.
    fn begin_shutdown(&self) -> bool {
        if self.transition(PoolState::Created, PoolState::Stopped) {
            self.queue.close();
            self.tracker.close();
            self.signal.cancel();
            info!("pool shut down before it was started");
            return true;
        }

        if !self.transition(PoolState::Running, PoolState::Draining) {
            return false;
        }

        info!(
            mode = %self.config.shutdown_mode,
            queued = self.queue.len(),
            "shutdown requested, draining pool"
        );
        self.queue.close();
        true
    }

    /// Fire the signal and report every task still queued as dropped.
    async fn cancel_and_drop_queued(&self, reason: &str) {
        if self.signal.cancel() {
            info!(reason, "cancellation signal fired");
        }

        let dropped = self.queue.drain().await;
        if dropped.is_empty() {
            return;
        }

        let count = dropped.len() as u64;
        warn!(count, reason, "dropping queued tasks");
        Counters::add(&self.counters.tasks_dropped, count);
        for task in dropped {
            self.events.emit(
                task.id,
                TaskEventKind::Dropped {
                    reason: reason.to_string(),
                },
            );
        }
        self.instruments.record_dropped(count);
    }

    fn record_submitted(&self, id: TaskId) {
        Counters::incr(&self.counters.tasks_submitted);
        self.instruments.record_submitted();
        debug!(task_id = %id, "task submitted");
    }

    /// Runs for the life of the pool: once every worker has returned, fire
    /// the signal, account for leftovers and mark the pool stopped.
    async fn finalize(self: Arc<Self>) {
        self.tracker.wait().await;
        self.cancel_and_drop_queued("pool stopped").await;

        // Also reached from `Running` when every handle was dropped
        // without a shutdown.
        self.state.send_replace(PoolState::Stopped);

        let stats = self.counters.snapshot(self.queue.len());
        info!(%stats, "pool stopped");
    }
}
