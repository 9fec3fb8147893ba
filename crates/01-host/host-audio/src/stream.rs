use std::fmt;
use std::sync::Arc;

use crate::error::HostResult;
use crate::wait::DrainSignal;

/// Sample encoding requested from the host device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Signed 16-bit little-endian integer samples.
    S16Le,
    /// 32-bit little-endian IEEE float samples.
    F32Le,
}

impl SampleEncoding {
    /// Size of one sample of this encoding in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::S16Le => 2,
            SampleEncoding::F32Le => 4,
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleEncoding::S16Le => f.write_str("s16le"),
            SampleEncoding::F32Le => f.write_str("f32le"),
        }
    }
}

/// Parameters for opening a host output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    /// Sample encoding of submitted bytes.
    pub encoding: SampleEncoding,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hertz.
    pub sample_rate_hz: u32,
}

impl StreamSpec {
    /// Bytes occupied by one interleaved frame.
    pub const fn frame_bytes(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }

    /// Bytes the device consumes per second of playback.
    pub const fn bytes_per_second(&self) -> usize {
        self.frame_bytes() * self.sample_rate_hz as usize
    }
}

/// Buffered output object owned by exactly one guest port.
///
/// Implementations must be safe to call from several threads at once: the
/// port manager submits under a shared lock and polls `queued_bytes` with no
/// lock held at all.
pub trait HostStream: Send + Sync {
    /// Parameters this stream was opened with.
    fn spec(&self) -> StreamSpec;

    /// Appends interleaved bytes to the stream's queue.
    fn submit(&self, bytes: &[u8]) -> HostResult<()>;

    /// Bytes submitted but not yet consumed by the device.
    fn queued_bytes(&self) -> usize;

    /// Resumes playback on the underlying device.
    fn resume(&self) -> HostResult<()>;

    /// Signal bumped whenever the device consumes queued data.
    ///
    /// Streams that return `None` are polled by yielding instead.
    fn drain_signal(&self) -> Option<&DrainSignal> {
        None
    }
}

/// Factory for host output streams.
pub trait HostBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Opens a playback stream on the default device.
    fn open_stream(&self, spec: &StreamSpec) -> HostResult<Arc<dyn HostStream>>;
}
