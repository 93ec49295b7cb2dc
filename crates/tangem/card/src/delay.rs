//! Security delay handling, progress reporting and cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::{Error, Result};

/// Cloneable flag that aborts a running operation
///
/// Cancelling never interrupts bytes already on the wire; the engine checks
/// the flag between exchanges and discards any response that arrives after
/// it was raised.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// New, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before the next operation
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Receives notifications while the engine talks to the card
///
/// Called from the thread running the operation.
pub trait DelayObserver: Send + Sync {
    /// An exchange is about to start with the given timeout
    fn on_before_request(&self, _timeout: Duration) {}

    /// An exchange finished, successfully or not
    fn on_after_request(&self) {}

    /// The card is running a security delay
    fn on_security_delay(&self, _remaining: Duration) {}

    /// The retry loop ended
    fn on_wait_finished(&self) {}

    /// Progress of a multi-part operation, in percent
    fn on_progress(&self, _percent: u8) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DelayObserver for NoopObserver {}

/// State of one command's retry loop
#[derive(Debug, Clone)]
pub(crate) struct RetryContext {
    /// Last pause reported by the card
    pub(crate) pause: Duration,
    /// Sum of all reported pauses
    pub(crate) waited: Duration,
    /// Number of pause responses seen
    pub(crate) rounds: u32,
    /// Return the first pause to the caller instead of resending
    pub(crate) break_on_pause: bool,
}

impl RetryContext {
    pub(crate) const fn new(break_on_pause: bool) -> Self {
        Self {
            pause: Duration::ZERO,
            waited: Duration::ZERO,
            rounds: 0,
            break_on_pause,
        }
    }

    pub(crate) fn record(&mut self, pause: Duration) {
        self.pause = pause;
        self.waited += pause;
        self.rounds += 1;
    }
}
