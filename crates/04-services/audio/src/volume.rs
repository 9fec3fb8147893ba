//! Per-channel gain tables.
//!
//! Guest volume updates arrive as a channel bitmask plus an array of
//! candidate values. For the standard 8-channel layout the guest orders the
//! rear and side pairs differently from the host, so destination channels
//! 4..=7 read their value from source slots 6, 7, 4, 5.

use crate::format::{ChannelLayout, OutputFormat, SampleType};

/// Largest channel count any layout carries.
pub const MAX_CHANNELS: usize = 8;

/// Unity gain (0 dB).
pub const VOLUME_0DB: i32 = 32768;

/// Index into the caller's value array that feeds destination channel `dest`.
#[inline]
pub const fn source_index(layout: ChannelLayout, dest: usize) -> usize {
    if !layout.is_standard_surround() {
        return dest;
    }
    match dest {
        4 => 6,
        5 => 7,
        6 => 4,
        7 => 5,
        other => other,
    }
}

/// Gains for the channels of one port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeTable {
    layout: ChannelLayout,
    gains: [i32; MAX_CHANNELS],
}

impl VolumeTable {
    /// Every channel at [`VOLUME_0DB`].
    pub fn unity(layout: ChannelLayout) -> Self {
        Self {
            layout,
            gains: [VOLUME_0DB; MAX_CHANNELS],
        }
    }

    /// Gains of the layout's channels.
    pub fn as_slice(&self) -> &[i32] {
        &self.gains[..usize::from(self.layout.channels())]
    }

    /// Whether every channel sits at unity.
    pub fn is_unity(&self) -> bool {
        self.as_slice().iter().all(|&gain| gain == VOLUME_0DB)
    }

    /// Applies a bitmask-selected update, returning how many channels changed.
    ///
    /// Bit `i` selects channel `i`; bits beyond the layout's channel count
    /// are ignored. `values` is indexed through [`source_index`].
    pub fn apply(&mut self, bitmask: u32, values: &[i32; MAX_CHANNELS]) -> usize {
        let channels = usize::from(self.layout.channels());
        let mut touched = 0;
        for dest in 0..channels {
            if bitmask & (1 << dest) == 0 {
                continue;
            }
            self.gains[dest] = values[source_index(self.layout, dest)];
            touched += 1;
        }
        touched
    }
}

/// Scales interleaved little-endian samples in place by per-channel gains.
///
/// A trailing partial frame is left untouched.
pub fn scale_interleaved(format: OutputFormat, gains: &[i32], bytes: &mut [u8]) {
    let frame_bytes = format.frame_bytes();
    let sample_bytes = usize::from(format.bytes_per_sample());
    for frame in bytes.chunks_exact_mut(frame_bytes) {
        for (sample, &gain) in frame.chunks_exact_mut(sample_bytes).zip(gains) {
            let gain = gain.max(0);
            match format.sample {
                SampleType::S16 => {
                    let value = i16::from_le_bytes([sample[0], sample[1]]);
                    let scaled = i64::from(value) * i64::from(gain) / i64::from(VOLUME_0DB);
                    let clamped = scaled.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
                    sample.copy_from_slice(&clamped.to_le_bytes());
                }
                SampleType::F32 => {
                    let value = f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
                    let scaled = value * (gain as f32 / VOLUME_0DB as f32);
                    sample.copy_from_slice(&scaled.to_le_bytes());
                }
            }
        }
    }
}
