use thiserror::Error;

/// Convenience result alias for host backend operations.
pub type HostResult<T, E = HostError> = Result<T, E>;

/// Errors surfaced by host audio backends.
#[derive(Debug, Error)]
pub enum HostError {
    /// No output device is available on this host.
    #[error("no default output device available")]
    NoDevice,

    /// The device refused the requested encoding/channel/rate combination.
    #[error("unsupported stream spec: {0}")]
    UnsupportedSpec(String),

    /// The backend refused to create a stream (injected or transient).
    #[error("stream creation refused by backend")]
    OpenRefused,

    /// The stream rejected submitted data.
    #[error("stream rejected {len} bytes")]
    Rejected {
        /// Number of bytes that were refused.
        len: usize,
    },

    /// Opaque backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl HostError {
    /// Wraps any displayable backend failure.
    pub fn backend(msg: impl Into<String>) -> Self {
        HostError::Backend(msg.into())
    }
}
