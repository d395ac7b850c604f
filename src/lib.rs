//! # workpool
//!
//! Cancellable worker pool for tokio: a bounded task queue, a fixed set of
//! workers and a lifecycle controller sharing one cancellation signal.
//!
//! Provides graceful shutdown with a best-effort deadline, per-task
//! cancellation contexts, fault isolation for failing or panicking tasks,
//! and OpenTelemetry observability.
//!
//! ```no_run
//! use std::time::Duration;
//! use workpool::{Pool, PoolConfig, Task};
//!
//! # async fn demo() -> workpool::error::Result<()> {
//! let pool = Pool::new(PoolConfig::new(3, 5))?;
//! pool.start()?;
//! pool.submit(Task::from_fn(|ctx| async move {
//!     tokio::select! {
//!         _ = tokio::time::sleep(Duration::from_millis(10)) => Ok(()),
//!         _ = ctx.cancelled() => anyhow::bail!("cancelled"),
//!     }
//! }))
//! .await?;
//! pool.shutdown(Duration::from_secs(2)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod pool;
pub mod telemetry;

pub use config::{PoolConfig, ShutdownMode};
pub use error::{Error, Result};
pub use event::{TaskEvent, TaskEventKind};
pub use model::{PoolState, Task, TaskContext, TaskId};
pub use pool::{Pool, PoolStats};
