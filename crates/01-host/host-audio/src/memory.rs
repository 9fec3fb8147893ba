use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::{HostError, HostResult};
use crate::stream::{HostBackend, HostStream, StreamSpec};
use crate::wait::DrainSignal;

const REALTIME_TICK: Duration = Duration::from_millis(2);

/// How a [`MemoryStream`]'s queue empties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DrainMode {
    /// Only explicit [`MemoryStream::consume`] calls drain.
    Manual,
    /// A background thread consumes at the stream's playback rate.
    Realtime,
    /// A background thread consumes `bytes` every `every`.
    Fixed { bytes: usize, every: Duration },
}

/// In-memory backend with controllable drain and failure injection.
pub struct MemoryBackend {
    streams: Mutex<Vec<Weak<MemoryStream>>>,
    refuse_open: AtomicBool,
    drain: DrainMode,
    recording: bool,
}

impl MemoryBackend {
    /// Backend whose streams only drain when told to.
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(Vec::new()),
            refuse_open: AtomicBool::new(false),
            drain: DrainMode::Manual,
            recording: false,
        }
    }

    /// Streams drain at their nominal playback rate, like a real device.
    pub fn realtime(mut self) -> Self {
        self.drain = DrainMode::Realtime;
        self
    }

    /// Streams drain `bytes` every `every` on a background thread.
    pub fn draining(mut self, bytes: usize, every: Duration) -> Self {
        self.drain = DrainMode::Fixed { bytes, every };
        self
    }

    /// Keeps a copy of every submission for later inspection.
    pub fn recording(mut self) -> Self {
        self.recording = true;
        self
    }

    /// Makes subsequent `open_stream` calls fail until cleared.
    pub fn set_refuse_open(&self, refuse: bool) {
        self.refuse_open.store(refuse, Ordering::Release);
    }

    /// Number of streams opened over the backend's lifetime.
    pub fn opened_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Stream opened `index`-th, if it is still alive.
    pub fn stream(&self, index: usize) -> Option<Arc<MemoryStream>> {
        self.streams.lock().get(index).and_then(Weak::upgrade)
    }

    /// Most recently opened stream, if it is still alive.
    pub fn last_stream(&self) -> Option<Arc<MemoryStream>> {
        self.streams.lock().last().and_then(Weak::upgrade)
    }

    /// Streams that are still owned by someone.
    pub fn live_streams(&self) -> usize {
        self.streams
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open_stream(&self, spec: &StreamSpec) -> HostResult<Arc<dyn HostStream>> {
        if self.refuse_open.load(Ordering::Acquire) {
            warn!("memory backend refusing stream {spec:?}");
            return Err(HostError::OpenRefused);
        }
        if spec.channels == 0 || spec.sample_rate_hz == 0 {
            return Err(HostError::UnsupportedSpec(format!("{spec:?}")));
        }

        let stream = Arc::new(MemoryStream::new(*spec, self.recording));
        match self.drain {
            DrainMode::Manual => {}
            DrainMode::Realtime => {
                let per_tick = spec.bytes_per_second() * REALTIME_TICK.as_millis() as usize / 1000;
                spawn_drainer(&stream, per_tick.max(spec.frame_bytes()), REALTIME_TICK)?;
            }
            DrainMode::Fixed { bytes, every } => spawn_drainer(&stream, bytes, every)?,
        }
        let mut streams = self.streams.lock();
        streams.push(Arc::downgrade(&stream));
        debug!("memory stream {} opened: {spec:?} ({:?})", streams.len() - 1, self.drain);
        drop(streams);
        Ok(stream)
    }
}

fn spawn_drainer(stream: &Arc<MemoryStream>, bytes: usize, every: Duration) -> HostResult<()> {
    let weak = Arc::downgrade(stream);
    thread::Builder::new()
        .name("memory-drain".into())
        .spawn(move || loop {
            thread::sleep(every);
            match weak.upgrade() {
                Some(stream) => {
                    stream.consume(bytes);
                }
                None => break,
            }
        })
        .map(|_| ())
        .map_err(|err| HostError::backend(format!("spawn drain thread: {err}")))
}

/// In-memory stream whose queue level is observable and drainable.
pub struct MemoryStream {
    spec: StreamSpec,
    queue: Mutex<VecDeque<u8>>,
    queued: AtomicUsize,
    submitted: AtomicU64,
    history: Option<Mutex<Vec<Vec<u8>>>>,
    reject: AtomicBool,
    resumed: AtomicBool,
    signal: DrainSignal,
}

impl MemoryStream {
    fn new(spec: StreamSpec, recording: bool) -> Self {
        Self {
            spec,
            queue: Mutex::new(VecDeque::new()),
            queued: AtomicUsize::new(0),
            submitted: AtomicU64::new(0),
            history: recording.then(|| Mutex::new(Vec::new())),
            reject: AtomicBool::new(false),
            resumed: AtomicBool::new(false),
            signal: DrainSignal::new(),
        }
    }

    /// Removes up to `max` bytes from the front of the queue.
    pub fn consume(&self, max: usize) -> usize {
        let taken = {
            let mut queue = self.queue.lock();
            let taken = max.min(queue.len());
            queue.drain(..taken);
            self.queued.store(queue.len(), Ordering::Release);
            taken
        };
        if taken > 0 {
            self.signal.notify();
        }
        taken
    }

    /// Empties the queue.
    pub fn drain_all(&self) -> usize {
        self.consume(usize::MAX)
    }

    /// Makes subsequent submissions fail until cleared.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::Release);
    }

    /// Whether `resume` has been called.
    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::Acquire)
    }

    /// Total bytes accepted since the stream was opened.
    pub fn submitted_bytes(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Copies of every accepted submission, oldest first. Empty unless recording.
    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.history
            .as_ref()
            .map(|history| history.lock().clone())
            .unwrap_or_default()
    }
}

impl HostStream for MemoryStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn submit(&self, bytes: &[u8]) -> HostResult<()> {
        if self.reject.load(Ordering::Acquire) {
            return Err(HostError::Rejected { len: bytes.len() });
        }
        {
            let mut queue = self.queue.lock();
            queue.extend(bytes.iter().copied());
            self.queued.store(queue.len(), Ordering::Release);
        }
        self.submitted
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        if let Some(history) = &self.history {
            history.lock().push(bytes.to_vec());
        }
        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    fn resume(&self) -> HostResult<()> {
        self.resumed.store(true, Ordering::Release);
        Ok(())
    }

    fn drain_signal(&self) -> Option<&DrainSignal> {
        Some(&self.signal)
    }
}
