use thiserror::Error;

use host_audio::HostError;

/// Result alias for port manager operations.
pub type AudioOutResult<T> = Result<T, AudioOutError>;

/// Guest-facing error code for a bad or closed port.
pub const ERROR_INVALID_PORT: i32 = 0x8026_0004_u32 as i32;

/// Generic guest-facing failure code.
pub const ERROR_GENERIC: i32 = -1;

/// Recoverable failures returned by the port manager.
#[derive(Debug, Error)]
pub enum AudioOutError {
    /// Handle out of range, or its slot is not open.
    #[error("invalid port handle {0}")]
    InvalidPort(i64),

    /// Every slot in the port table is in use.
    #[error("no free ports (capacity {capacity})")]
    NoFreePorts {
        /// Size of the exhausted table.
        capacity: usize,
    },

    /// The host backend could not create a stream.
    #[error("host stream open failed: {0}")]
    HostOpenFailed(#[source] HostError),

    /// The host stream rejected submitted samples.
    #[error("host stream rejected submission: {0}")]
    SubmitFailed(#[source] HostError),

    /// The caller's buffer is shorter than one port buffer.
    #[error("output buffer holds {actual} bytes, port needs {expected}")]
    BufferTooShort {
        /// Bytes one buffer occupies for this port.
        expected: usize,
        /// Bytes the caller supplied.
        actual: usize,
    },
}

impl AudioOutError {
    /// Guest-visible sentinel for this error.
    pub fn code(&self) -> i32 {
        match self {
            AudioOutError::InvalidPort(_) => ERROR_INVALID_PORT,
            AudioOutError::NoFreePorts { .. }
            | AudioOutError::HostOpenFailed(_)
            | AudioOutError::SubmitFailed(_)
            | AudioOutError::BufferTooShort { .. } => ERROR_GENERIC,
        }
    }
}

/// Raw guest format value with no known translation.
///
/// Format validity is the caller's precondition; the raw open path treats
/// this as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported audio output format {0:#x}")]
pub struct UnsupportedFormat(pub u32);

/// Rejected manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The port table must hold at least one slot.
    #[error("port capacity must be at least 1")]
    ZeroCapacity,

    /// Handles are `i32` on the guest side.
    #[error("port capacity {0} exceeds the handle range")]
    CapacityTooLarge(usize),
}
