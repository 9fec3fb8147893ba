//! Default-device playback through `cpal`.
//!
//! `cpal::Stream` is not `Send` on every platform, so each stream lives on a
//! dedicated thread that owns it for its whole life. The port-facing
//! [`CpalStream`] only holds the shared byte queue and a control channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::{HostError, HostResult};
use crate::stream::{HostBackend, HostStream, SampleEncoding, StreamSpec};
use crate::wait::DrainSignal;

/// Backend that opens streams on the host's default output device.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    /// Creates a shareable cpal backend.
    pub fn new_handle() -> Arc<dyn HostBackend> {
        Arc::new(Self)
    }
}

impl HostBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open_stream(&self, spec: &StreamSpec) -> HostResult<Arc<dyn HostStream>> {
        let shared = Arc::new(Shared::default());
        let (ready_tx, ready_rx) = bounded::<HostResult<()>>(1);
        let (control_tx, control_rx) = bounded::<Control>(4);

        let thread_shared = Arc::clone(&shared);
        let thread_spec = *spec;
        let worker = thread::Builder::new()
            .name("cpal-out".into())
            .spawn(move || run_device(thread_spec, thread_shared, ready_tx, control_rx))
            .map_err(|err| HostError::backend(format!("spawn device thread: {err}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Arc::new(CpalStream {
                spec: *spec,
                shared,
                control: control_tx,
                worker: Some(worker),
            })),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(HostError::backend("device thread exited during setup"))
            }
        }
    }
}

enum Control {
    Resume,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<u8>>,
    queued: AtomicUsize,
    signal: DrainSignal,
}

impl Shared {
    /// Decodes up to `out.len()` whole samples, padding the rest with silence.
    fn fill<const N: usize, T: Copy>(&self, out: &mut [T], silence: T, decode: fn([u8; N]) -> T) {
        let consumed = {
            let mut queue = self.queue.lock();
            let take = out.len().min(queue.len() / N);
            let bytes = &queue.make_contiguous()[..take * N];
            for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(N)) {
                let mut raw = [0u8; N];
                raw.copy_from_slice(chunk);
                *slot = decode(raw);
            }
            out[take..].fill(silence);
            queue.drain(..take * N);
            self.queued.store(queue.len(), Ordering::Release);
            take * N
        };
        if consumed > 0 {
            self.signal.notify();
        }
    }
}

fn run_device(
    spec: StreamSpec,
    shared: Arc<Shared>,
    ready: Sender<HostResult<()>>,
    control: Receiver<Control>,
) {
    let stream = match build_stream(&spec, &shared) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    debug!(
        "cpal stream up: {} ch={} rate={}",
        spec.encoding, spec.channels, spec.sample_rate_hz
    );

    // Disconnection of the control channel means the owning port closed.
    while let Ok(cmd) = control.recv() {
        match cmd {
            Control::Resume => {
                if let Err(err) = stream.play() {
                    warn!("cpal play failed: {err}");
                }
            }
        }
    }
    drop(stream);
    debug!("cpal stream released");
}

fn build_stream(spec: &StreamSpec, shared: &Arc<Shared>) -> HostResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(HostError::NoDevice)?;
    let config = StreamConfig {
        channels: spec.channels,
        sample_rate: SampleRate(spec.sample_rate_hz),
        buffer_size: BufferSize::Default,
    };
    let on_error = |err: cpal::StreamError| warn!("cpal stream error: {err}");

    let result = match spec.encoding {
        SampleEncoding::S16Le => {
            let shared = Arc::clone(shared);
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    shared.fill(data, 0, i16::from_le_bytes)
                },
                on_error,
                None,
            )
        }
        SampleEncoding::F32Le => {
            let shared = Arc::clone(shared);
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    shared.fill(data, 0.0, f32::from_le_bytes)
                },
                on_error,
                None,
            )
        }
    };

    result.map_err(|err| match err {
        cpal::BuildStreamError::StreamConfigNotSupported => {
            HostError::UnsupportedSpec(format!("{spec:?}"))
        }
        other => HostError::backend(other.to_string()),
    })
}

/// Port-facing handle to a device stream owned by a worker thread.
pub struct CpalStream {
    spec: StreamSpec,
    shared: Arc<Shared>,
    control: Sender<Control>,
    worker: Option<JoinHandle<()>>,
}

impl HostStream for CpalStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn submit(&self, bytes: &[u8]) -> HostResult<()> {
        let mut queue = self.shared.queue.lock();
        queue.extend(bytes.iter().copied());
        self.shared.queued.store(queue.len(), Ordering::Release);
        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    fn resume(&self) -> HostResult<()> {
        self.control
            .send(Control::Resume)
            .map_err(|_| HostError::backend("device thread gone"))
    }

    fn drain_signal(&self) -> Option<&DrainSignal> {
        Some(&self.shared.signal)
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        // Swap in a dead sender so the worker sees a disconnected channel.
        let (dead, _) = bounded(0);
        drop(std::mem::replace(&mut self.control, dead));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
