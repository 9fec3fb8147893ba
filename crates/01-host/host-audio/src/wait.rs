//! Drain notification primitives shared by host streams and the backpressure gate.
//!
//! Native targets park on the `atomic-wait` crate (futex-backed where
//! available). On wasm there is no blocking wait on the main thread, so
//! waiters fall back to returning immediately and callers re-poll.

use std::sync::atomic::{AtomicU32, Ordering};

/// Result of attempting to wait on an atomic location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// The value matched and the caller was woken by a notify (or spuriously).
    Ok,
    /// The value no longer matched when the wait was attempted.
    NotEqual,
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use super::{AtomicU32, WaitResult};

    #[inline]
    pub(crate) fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
        atomic_wait::wait(atomic, expected);
        WaitResult::Ok
    }

    #[inline]
    pub(crate) fn wake_all(atomic: &AtomicU32) {
        atomic_wait::wake_all(atomic as *const AtomicU32);
    }
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use super::{AtomicU32, WaitResult};

    #[inline]
    pub(crate) fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
        let _ = (atomic, expected);
        WaitResult::NotEqual
    }

    #[inline]
    pub(crate) fn wake_all(atomic: &AtomicU32) {
        let _ = atomic;
    }
}

/// Blocks the current caller until the atomic differs from `expected` or a wakeup occurs.
#[inline]
pub fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
    if atomic.load(Ordering::Acquire) != expected {
        return WaitResult::NotEqual;
    }
    imp::wait_u32(atomic, expected)
}

/// Wakes all waiters parked on `atomic`.
#[inline]
pub fn wake_all(atomic: &AtomicU32) {
    imp::wake_all(atomic)
}

/// Epoch counter a stream bumps each time its device consumes queued bytes.
///
/// Waiters must read [`DrainSignal::epoch`] *before* checking the queue level,
/// then pass that epoch to [`DrainSignal::wait`]; a drain that lands between
/// the two calls changes the epoch and the wait returns immediately.
#[derive(Debug, Default)]
pub struct DrainSignal {
    epoch: AtomicU32,
}

impl DrainSignal {
    /// Creates a signal at epoch zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch.
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Publishes a drain and wakes every parked waiter.
    #[inline]
    pub fn notify(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        wake_all(&self.epoch);
    }

    /// Parks until the epoch moves past `observed`.
    #[inline]
    pub fn wait(&self, observed: u32) -> WaitResult {
        wait_u32(&self.epoch, observed)
    }
}
