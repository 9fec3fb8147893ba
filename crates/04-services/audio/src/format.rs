//! Guest audio format translation.
//!
//! The guest describes a port's data as one value of a fixed enumeration
//! (sample type × channel layout). Here that enumeration is split into
//! [`SampleType`] and [`ChannelLayout`], and [`translate`] maps the pair onto
//! the parameters a host stream is opened with.

use std::fmt;

use host_audio::{SampleEncoding, StreamSpec};
use serde::Deserialize;

use crate::error::UnsupportedFormat;

/// Per-sample storage of guest data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    /// Signed 16-bit integer.
    S16,
    /// 32-bit float.
    F32,
}

impl SampleType {
    /// Host encoding carrying this sample type.
    pub const fn encoding(self) -> SampleEncoding {
        match self {
            SampleType::S16 => SampleEncoding::S16Le,
            SampleType::F32 => SampleEncoding::F32Le,
        }
    }

    /// Bytes per sample.
    pub const fn bytes(self) -> u8 {
        match self {
            SampleType::S16 => 2,
            SampleType::F32 => 4,
        }
    }
}

/// Channel arrangement of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelLayout {
    /// One channel.
    Mono,
    /// Left, right.
    Stereo,
    /// Eight channels in linear order.
    Surround8Linear,
    /// Eight channels with the guest's "standard" surround order, whose
    /// rear and side pairs are swapped relative to the linear layout.
    Surround8Standard,
}

impl ChannelLayout {
    /// Interleaved channel count.
    pub const fn channels(self) -> u8 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
            ChannelLayout::Surround8Linear | ChannelLayout::Surround8Standard => 8,
        }
    }

    /// Whether volume updates go through the rear/side swap.
    pub const fn is_standard_surround(self) -> bool {
        matches!(self, ChannelLayout::Surround8Standard)
    }
}

/// Guest output format: sample type plus channel layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct OutputFormat {
    /// Sample storage.
    pub sample: SampleType,
    /// Channel arrangement.
    pub layout: ChannelLayout,
}

impl OutputFormat {
    /// Signed 16-bit mono.
    pub const S16_MONO: Self = Self::new(SampleType::S16, ChannelLayout::Mono);
    /// Signed 16-bit stereo.
    pub const S16_STEREO: Self = Self::new(SampleType::S16, ChannelLayout::Stereo);
    /// Signed 16-bit, eight channels, linear order.
    pub const S16_8CH: Self = Self::new(SampleType::S16, ChannelLayout::Surround8Linear);
    /// Signed 16-bit, eight channels, standard order.
    pub const S16_8CH_STD: Self = Self::new(SampleType::S16, ChannelLayout::Surround8Standard);
    /// Float mono.
    pub const F32_MONO: Self = Self::new(SampleType::F32, ChannelLayout::Mono);
    /// Float stereo.
    pub const F32_STEREO: Self = Self::new(SampleType::F32, ChannelLayout::Stereo);
    /// Float, eight channels, linear order.
    pub const F32_8CH: Self = Self::new(SampleType::F32, ChannelLayout::Surround8Linear);
    /// Float, eight channels, standard order.
    pub const F32_8CH_STD: Self = Self::new(SampleType::F32, ChannelLayout::Surround8Standard);

    /// Every format the guest enumeration defines, in raw-value order.
    pub const ALL: [Self; 8] = [
        Self::S16_MONO,
        Self::S16_STEREO,
        Self::S16_8CH,
        Self::F32_MONO,
        Self::F32_STEREO,
        Self::F32_8CH,
        Self::S16_8CH_STD,
        Self::F32_8CH_STD,
    ];

    /// Builds a format from its parts.
    pub const fn new(sample: SampleType, layout: ChannelLayout) -> Self {
        Self { sample, layout }
    }

    /// Decodes the guest enumeration value.
    pub fn from_raw(raw: u32) -> Result<Self, UnsupportedFormat> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(UnsupportedFormat(raw))
    }

    /// Guest enumeration value of this format.
    pub fn to_raw(self) -> u32 {
        match (self.sample, self.layout) {
            (SampleType::S16, ChannelLayout::Mono) => 0,
            (SampleType::S16, ChannelLayout::Stereo) => 1,
            (SampleType::S16, ChannelLayout::Surround8Linear) => 2,
            (SampleType::F32, ChannelLayout::Mono) => 3,
            (SampleType::F32, ChannelLayout::Stereo) => 4,
            (SampleType::F32, ChannelLayout::Surround8Linear) => 5,
            (SampleType::S16, ChannelLayout::Surround8Standard) => 6,
            (SampleType::F32, ChannelLayout::Surround8Standard) => 7,
        }
    }

    /// Interleaved channel count.
    pub const fn channels(self) -> u8 {
        self.layout.channels()
    }

    /// Bytes per sample.
    pub const fn bytes_per_sample(self) -> u8 {
        self.sample.bytes()
    }

    /// Bytes per interleaved frame.
    pub const fn frame_bytes(self) -> usize {
        self.channels() as usize * self.bytes_per_sample() as usize
    }
}

impl TryFrom<u32> for OutputFormat {
    type Error = UnsupportedFormat;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sample = match self.sample {
            SampleType::S16 => "s16",
            SampleType::F32 => "f32",
        };
        let layout = match self.layout {
            ChannelLayout::Mono => "mono",
            ChannelLayout::Stereo => "stereo",
            ChannelLayout::Surround8Linear => "8ch",
            ChannelLayout::Surround8Standard => "8ch-std",
        };
        write!(f, "{sample}-{layout}")
    }
}

/// Host-side shape of a guest format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostFormat {
    /// Encoding the host stream is opened with.
    pub encoding: SampleEncoding,
    /// Interleaved channel count.
    pub channels: u8,
    /// Bytes per sample.
    pub bytes_per_sample: u8,
}

impl HostFormat {
    /// Stream parameters at `sample_rate_hz`.
    pub fn stream_spec(&self, sample_rate_hz: u32) -> StreamSpec {
        StreamSpec {
            encoding: self.encoding,
            channels: u16::from(self.channels),
            sample_rate_hz,
        }
    }
}

/// Maps a guest format onto host stream parameters.
pub fn translate(format: OutputFormat) -> HostFormat {
    HostFormat {
        encoding: format.sample.encoding(),
        channels: format.channels(),
        bytes_per_sample: format.bytes_per_sample(),
    }
}
