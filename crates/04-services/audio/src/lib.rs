#![deny(missing_docs)]
//! Guest audio-out port manager.
//!
//! Multiplexes a bounded set of independent guest output ports onto host
//! audio streams. Each open port owns exactly one [`host_audio::HostStream`];
//! writers are throttled by the backpressure gate once that stream holds more
//! than the configured threshold of unplayed bytes.
//!
//! * [`format`] – guest format enumeration → host stream parameters.
//! * [`volume`] – per-channel gain tables and the surround remap rule.
//! * [`PortManager`] – `open` / `output` / `set_volume` / `status` / `close`.

mod config;
mod error;
pub mod format;
mod gate;
mod manager;
mod metrics;
mod table;
pub mod volume;

pub use config::AudioOutConfig;
pub use error::{
    AudioOutError, AudioOutResult, ConfigError, UnsupportedFormat, ERROR_GENERIC, ERROR_INVALID_PORT,
};
pub use format::{translate, ChannelLayout, HostFormat, OutputFormat, SampleType};
pub use manager::{PortManager, PortStatus};
pub use metrics::PortMetricsSnapshot;
pub use table::{PortHandle, PortKind};
pub use volume::{VolumeTable, MAX_CHANNELS, VOLUME_0DB};
