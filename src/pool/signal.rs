//! One-shot cancellation signal shared by every worker in a pool.
//!
//! Wraps a [`CancellationToken`] with an atomic flag so that exactly one
//! caller observes the `active -> cancelled` transition. The token itself
//! already tolerates repeated `cancel()` calls; the flag exists so the
//! controller can log and count the transition once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Broadcast flag with two states, `active` and `cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that performed the
    /// transition; every later call is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has fired.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// A token that fires with this signal but can also be cancelled on its
    /// own, used as the per-task execution context.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
