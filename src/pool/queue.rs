//! Bounded FIFO connecting producers to workers.
//!
//! Built on a bounded tokio mpsc channel. Workers share the receiver behind
//! an async mutex; whoever holds it waits for the next task. Every wait in
//! this module races the pool's cancellation signal so that neither a
//! blocked producer nor an idle worker can stall shutdown.

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Task;

use super::signal::CancellationSignal;

/// Outcome of a [`TaskQueue::dequeue`] call. These are the only three.
#[derive(Debug)]
pub enum Dequeued {
    /// The task at the head of the queue, now owned by the caller.
    Task(Task),
    /// The cancellation signal fired first.
    Cancelled,
    /// The queue was closed and nothing is left in it.
    Closed,
}

/// Bounded task queue.
#[derive(Debug)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    rx: Mutex<mpsc::Receiver<Task>>,
    closed: CancellationToken,
    signal: CancellationSignal,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` tasks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; [`PoolConfig`](crate::config::PoolConfig)
    /// validation rejects that before a queue is ever built.
    pub fn new(capacity: usize, signal: CancellationSignal) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
            signal,
        }
    }

    /// Wait for a free slot at the tail. The slot is held by the returned
    /// permit until it is used or dropped.
    ///
    /// Fails with [`Error::PoolShuttingDown`] if the queue is closed or the
    /// cancellation signal fires before space becomes available.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, Task>> {
        tokio::select! {
            biased;
            _ = self.signal.cancelled() => Err(Error::PoolShuttingDown),
            _ = self.closed.cancelled() => Err(Error::PoolShuttingDown),
            permit = self.tx.reserve() => permit.map_err(|_| Error::PoolShuttingDown),
        }
    }

    /// Claim a free slot without waiting. A full queue yields
    /// [`Error::QueueFull`].
    pub fn try_reserve(&self) -> Result<mpsc::Permit<'_, Task>> {
        if self.closed.is_cancelled() || self.signal.is_cancelled() {
            return Err(Error::PoolShuttingDown);
        }
        self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => Error::QueueFull,
            mpsc::error::TrySendError::Closed(()) => Error::PoolShuttingDown,
        })
    }

    /// Place `task` at the tail, waiting while the queue is full.
    pub async fn enqueue(&self, task: Task) -> Result<()> {
        self.reserve().await?.send(task);
        Ok(())
    }

    /// Place `task` at the tail without waiting.
    pub fn try_enqueue(&self, task: Task) -> Result<()> {
        self.try_reserve()?.send(task);
        Ok(())
    }

    /// Take the task at the head, waiting until one is available, the signal
    /// fires, or the queue is closed and empty.
    pub async fn dequeue(&self) -> Dequeued {
        let mut rx = tokio::select! {
            biased;
            _ = self.signal.cancelled() => return Dequeued::Cancelled,
            rx = self.rx.lock() => rx,
        };

        tokio::select! {
            biased;
            _ = self.signal.cancelled() => Dequeued::Cancelled,
            msg = rx.recv() => match msg {
                Some(task) => Dequeued::Task(task),
                // Only once `drain` has closed the receiver.
                None => Dequeued::Closed,
            },
            _ = self.closed.cancelled() => match rx.try_recv() {
                Ok(task) => Dequeued::Task(task),
                Err(_) => Dequeued::Closed,
            },
        }
    }

    /// Stop accepting tasks. Queued tasks stay available to `dequeue`;
    /// producers blocked in `enqueue` wake with `PoolShuttingDown`.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!(queued = self.len(), "task queue closed");
        }
        self.closed.cancel();
    }

    /// Close the queue and remove every task still in it.
    ///
    /// Waits for the receiver lock, so call it only once the cancellation
    /// signal has fired or the workers are gone.
    pub async fn drain(&self) -> Vec<Task> {
        self.close();
        let mut rx = self.rx.lock().await;
        rx.close();
        let mut drained = Vec::new();
        while let Ok(task) = rx.try_recv() {
            drained.push(task);
        }
        drained
    }

    /// Number of tasks currently queued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
