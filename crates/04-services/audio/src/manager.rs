//! Public port operations.
//!
//! One reader/writer lock guards the whole port table. `open` and `close`
//! change occupancy and take it exclusively; `output`, `set_volume`, and the
//! queries only touch one port and share it, so writers on different ports
//! never serialise against each other. A port's gains sit behind their own
//! mutex, which makes concurrent `set_volume` calls on one port
//! last-writer-wins per call. The backpressure gate runs after the table
//! lock is released.

use std::sync::Arc;

use host_audio::HostBackend;
use log::{debug, trace, warn};
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::config::AudioOutConfig;
use crate::error::{AudioOutError, AudioOutResult, ConfigError};
use crate::format::{translate, OutputFormat};
use crate::gate;
use crate::metrics::{PortMetrics, PortMetricsSnapshot};
use crate::table::{Port, PortHandle, PortKind, PortTable};
use crate::volume::{scale_interleaved, VolumeTable, MAX_CHANNELS};

/// Snapshot returned by [`PortManager::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortStatus {
    /// Tag supplied at open time.
    pub kind: PortKind,
    /// Channel count derived from the port's format.
    pub channels: u8,
    /// Format the port was opened with.
    pub format: OutputFormat,
    /// Samples per channel in one guest buffer.
    pub samples_per_buffer: u32,
    /// Playback rate in Hertz.
    pub sample_rate_hz: u32,
}

/// Owner of the port table and every open port's host stream.
pub struct PortManager {
    backend: Arc<dyn HostBackend>,
    config: AudioOutConfig,
    table: RwLock<PortTable>,
}

impl PortManager {
    /// Creates a manager with `config.capacity` closed slots.
    pub fn new(backend: Arc<dyn HostBackend>, config: AudioOutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            "audio-out: {} slots on {} backend (threshold {} bytes)",
            config.capacity,
            backend.name(),
            config.backpressure_threshold
        );
        Ok(Self {
            backend,
            table: RwLock::new(PortTable::new(config.capacity)),
            config,
        })
    }

    /// Creates a manager with [`AudioOutConfig::default`].
    pub fn with_defaults(backend: Arc<dyn HostBackend>) -> Self {
        let config = AudioOutConfig::default();
        Self {
            backend,
            table: RwLock::new(PortTable::new(config.capacity)),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AudioOutConfig {
        &self.config
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of open ports.
    pub fn open_ports(&self) -> usize {
        self.table.read().open_count()
    }

    /// Opens a port in the lowest free slot.
    ///
    /// The slot becomes open only once its host stream exists; a failed
    /// stream open leaves the table untouched.
    pub fn open(
        &self,
        kind: PortKind,
        samples_per_buffer: u32,
        sample_rate_hz: u32,
        format: OutputFormat,
    ) -> AudioOutResult<PortHandle> {
        let mut table = self.table.write();
        let Some(index) = table.first_free() else {
            warn!("audio-out: all {} ports in use", table.capacity());
            return Err(AudioOutError::NoFreePorts {
                capacity: table.capacity(),
            });
        };

        let spec = translate(format).stream_spec(sample_rate_hz);
        let stream = self.backend.open_stream(&spec).map_err(|err| {
            warn!("audio-out: {} stream for {format} failed: {err}", self.backend.name());
            AudioOutError::HostOpenFailed(err)
        })?;
        if let Err(err) = stream.resume() {
            warn!("audio-out: resume failed for {format}: {err}");
        }

        let handle = table.occupy(
            index,
            Port {
                kind,
                format,
                samples_per_buffer,
                sample_rate_hz,
                volume: Mutex::new(VolumeTable::unity(format.layout)),
                stream,
                metrics: PortMetrics::new(),
            },
        );
        debug!(
            "audio-out: opened {handle} kind={} {format} {samples_per_buffer}@{sample_rate_hz}Hz",
            kind.0
        );
        Ok(handle)
    }

    /// Opens a port from a raw guest format value.
    ///
    /// # Panics
    ///
    /// Panics if `raw_format` is not a known format. Format validity is the
    /// caller's precondition, so an unknown value is a contract violation.
    pub fn open_raw(
        &self,
        kind: PortKind,
        samples_per_buffer: u32,
        sample_rate_hz: u32,
        raw_format: u32,
    ) -> AudioOutResult<PortHandle> {
        let format = match OutputFormat::from_raw(raw_format) {
            Ok(format) => format,
            Err(err) => panic!("audio-out: {err}"),
        };
        self.open(kind, samples_per_buffer, sample_rate_hz, format)
    }

    /// Submits one guest buffer and blocks until the stream drains below the
    /// backpressure threshold.
    ///
    /// `None` is a no-op that reports zero samples written. Only the first
    /// buffer's worth of bytes is submitted; a shorter slice is rejected.
    /// Returns the number of samples per channel submitted.
    pub fn output(&self, handle: PortHandle, samples: Option<&[u8]>) -> AudioOutResult<u32> {
        self.check_range(handle)?;
        let Some(samples) = samples else {
            return Ok(0);
        };

        let table = self.table.read();
        let port = table.get(handle)?;
        let expected = port.buffer_bytes();
        let Some(data) = samples.get(..expected) else {
            return Err(AudioOutError::BufferTooShort {
                expected,
                actual: samples.len(),
            });
        };

        let submitted = if self.config.apply_gain {
            let volume = *port.volume.lock();
            if volume.is_unity() {
                port.stream.submit(data)
            } else {
                let mut scaled = data.to_vec();
                scale_interleaved(port.format, volume.as_slice(), &mut scaled);
                port.stream.submit(&scaled)
            }
        } else {
            port.stream.submit(data)
        };
        if let Err(err) = submitted {
            port.metrics.record_rejected();
            warn!("audio-out: {handle} submission rejected: {err}");
            return Err(AudioOutError::SubmitFailed(err));
        }
        port.metrics.record_submit(expected);

        let threshold = self.config.backpressure_threshold;
        let stream = Arc::clone(&port.stream);
        let written = port.samples_per_buffer;
        let queued = stream.queued_bytes();
        if queued > threshold {
            port.metrics.record_backpressure();
            trace!("audio-out: {handle} backpressure, {queued} bytes queued");
        }
        drop(table);

        let rounds = gate::wait_for_drain(stream.as_ref(), threshold);
        if rounds > 0 {
            trace!("audio-out: {handle} drained after {rounds} waits");
        }
        Ok(written)
    }

    /// Updates the channels selected by `bitmask` from `values`.
    ///
    /// For the standard 8-channel layout, channels 4..=7 read `values[6]`,
    /// `values[7]`, `values[4]`, `values[5]`; every other layout reads
    /// `values[i]` for channel `i`.
    pub fn set_volume(
        &self,
        handle: PortHandle,
        bitmask: u32,
        values: &[i32; MAX_CHANNELS],
    ) -> AudioOutResult<()> {
        self.check_range(handle)?;
        let table = self.table.read();
        let port = table.get(handle)?;
        let touched = port.volume.lock().apply(bitmask, values);
        trace!("audio-out: {handle} volume mask={bitmask:#x} touched={touched}");
        Ok(())
    }

    /// Kind and channel count of an open port.
    pub fn status(&self, handle: PortHandle) -> AudioOutResult<PortStatus> {
        self.check_range(handle)?;
        let table = self.table.read();
        let port = table.get(handle)?;
        Ok(PortStatus {
            kind: port.kind,
            channels: port.format.channels(),
            format: port.format,
            samples_per_buffer: port.samples_per_buffer,
            sample_rate_hz: port.sample_rate_hz,
        })
    }

    /// Current gains of an open port's channels.
    pub fn volume(&self, handle: PortHandle) -> AudioOutResult<SmallVec<[i32; MAX_CHANNELS]>> {
        self.check_range(handle)?;
        let table = self.table.read();
        let port = table.get(handle)?;
        let volume = port.volume.lock();
        Ok(SmallVec::from_slice(volume.as_slice()))
    }

    /// Output counters of an open port.
    pub fn metrics(&self, handle: PortHandle) -> AudioOutResult<PortMetricsSnapshot> {
        self.check_range(handle)?;
        let table = self.table.read();
        Ok(table.get(handle)?.metrics.snapshot())
    }

    /// Closes a port and releases its host stream.
    ///
    /// Must not race an in-flight `output` on the same handle; the stream
    /// stays alive until that call's gate returns.
    pub fn close(&self, handle: PortHandle) -> AudioOutResult<()> {
        self.check_range(handle)?;
        let port = self.table.write().release(handle)?;
        debug!("audio-out: closed {handle} ({})", port.format);
        drop(port);
        Ok(())
    }

    fn check_range(&self, handle: PortHandle) -> AudioOutResult<()> {
        if (handle.get() as usize) > self.config.capacity {
            return Err(AudioOutError::InvalidPort(i64::from(handle.get())));
        }
        Ok(())
    }
}

impl Drop for PortManager {
    fn drop(&mut self) {
        let released = self.table.get_mut().release_all();
        if released > 0 {
            debug!("audio-out: teardown released {released} open ports");
        }
    }
}
