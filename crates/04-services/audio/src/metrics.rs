use std::sync::atomic::{AtomicU64, Ordering};

/// Per-port output counters, updated under the shared table lock.
#[derive(Default)]
pub(crate) struct PortMetrics {
    buffers: AtomicU64,
    bytes: AtomicU64,
    backpressure_waits: AtomicU64,
    rejected: AtomicU64,
}

impl PortMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submit(&self, bytes: usize) {
        self.buffers.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_backpressure(&self) {
        self.backpressure_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PortMetricsSnapshot {
        PortMetricsSnapshot {
            buffers: self.buffers.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            backpressure_waits: self.backpressure_waits.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a port's output counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortMetricsSnapshot {
    /// Buffers accepted by the host stream.
    pub buffers: u64,
    /// Bytes accepted by the host stream.
    pub bytes: u64,
    /// Outputs that found the stream above the backpressure threshold.
    pub backpressure_waits: u64,
    /// Submissions the host stream refused.
    pub rejected: u64,
}
