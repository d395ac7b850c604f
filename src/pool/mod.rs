//! Cancellable worker pool: bounded task queue, worker set and lifecycle
//! controller sharing one cancellation signal.

pub mod control;
pub mod queue;
pub mod signal;
pub mod stats;
mod worker;

pub use control::Pool;
pub use queue::{Dequeued, TaskQueue};
pub use signal::CancellationSignal;
pub use stats::PoolStats;
