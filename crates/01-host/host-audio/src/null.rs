use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::HostResult;
use crate::stream::{HostBackend, HostStream, StreamSpec};

/// Backend whose streams swallow data instantly.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl NullBackend {
    /// Creates a shareable null backend.
    pub fn new_handle() -> Arc<dyn HostBackend> {
        Arc::new(Self)
    }
}

impl HostBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open_stream(&self, spec: &StreamSpec) -> HostResult<Arc<dyn HostStream>> {
        Ok(Arc::new(NullStream::new(*spec)))
    }
}

/// Stream that counts and discards submitted bytes.
#[derive(Debug)]
pub struct NullStream {
    spec: StreamSpec,
    discarded: AtomicU64,
}

impl NullStream {
    /// Creates a stream for `spec`.
    pub fn new(spec: StreamSpec) -> Self {
        Self {
            spec,
            discarded: AtomicU64::new(0),
        }
    }

    /// Total bytes thrown away so far.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl HostStream for NullStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn submit(&self, bytes: &[u8]) -> HostResult<()> {
        self.discarded
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        0
    }

    fn resume(&self) -> HostResult<()> {
        Ok(())
    }
}
