use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use host_audio::HostStream;
use parking_lot::Mutex;

use crate::error::{AudioOutError, AudioOutResult};
use crate::format::OutputFormat;
use crate::metrics::PortMetrics;
use crate::volume::VolumeTable;

/// Caller-visible 1-based port identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortHandle(NonZeroU32);

impl PortHandle {
    /// Wraps a raw handle; zero is never a handle.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Raw 1-based value.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub(crate) fn from_index(index: usize) -> Self {
        // Capacity is validated to fit in i32, so index + 1 never wraps to 0.
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    pub(crate) fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl TryFrom<i32> for PortHandle {
    type Error = AudioOutError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        u32::try_from(raw)
            .ok()
            .and_then(Self::new)
            .ok_or(AudioOutError::InvalidPort(i64::from(raw)))
    }
}

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller-supplied port classification, returned verbatim by status queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PortKind(pub i32);

/// One open port.
pub(crate) struct Port {
    pub(crate) kind: PortKind,
    pub(crate) format: OutputFormat,
    pub(crate) samples_per_buffer: u32,
    pub(crate) sample_rate_hz: u32,
    pub(crate) volume: Mutex<VolumeTable>,
    pub(crate) stream: Arc<dyn HostStream>,
    pub(crate) metrics: PortMetrics,
}

impl Port {
    /// Bytes one guest buffer occupies.
    pub(crate) fn buffer_bytes(&self) -> usize {
        self.samples_per_buffer as usize * self.format.frame_bytes()
    }
}

/// Fixed-capacity slots; `None` is a closed slot.
pub(crate) struct PortTable {
    slots: Vec<Option<Port>>,
}

impl PortTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Lowest closed slot.
    pub(crate) fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Places `port` in the closed slot `index`.
    pub(crate) fn occupy(&mut self, index: usize, port: Port) -> PortHandle {
        debug_assert!(self.slots[index].is_none(), "slot {index} already open");
        self.slots[index] = Some(port);
        PortHandle::from_index(index)
    }

    pub(crate) fn get(&self, handle: PortHandle) -> AudioOutResult<&Port> {
        self.slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(AudioOutError::InvalidPort(i64::from(handle.get())))
    }

    pub(crate) fn release(&mut self, handle: PortHandle) -> AudioOutResult<Port> {
        self.slots
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or(AudioOutError::InvalidPort(i64::from(handle.get())))
    }

    /// Closes every slot, returning how many were open.
    pub(crate) fn release_all(&mut self) -> usize {
        self.slots
            .iter_mut()
            .filter_map(Option::take)
            .count()
    }
}
