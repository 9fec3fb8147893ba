#![deny(missing_docs)]
//! Host audio backend boundary used by the guest audio-out port manager.
//!
//! The port manager never talks to a device API directly. It asks a
//! [`HostBackend`] for a [`HostStream`] shaped by a [`StreamSpec`], pushes raw
//! interleaved bytes into it, and polls how much is still queued.
//!
//! * [`NullBackend`] – accepts and discards everything; never backs up.
//! * [`MemoryBackend`] – in-memory streams with a controllable drain, used by
//!   tests and the CLI dry-run mode.
//! * `CpalBackend` – plays on the default output device (feature `cpal`).
//! * [`wait`] – drain notification primitives the backpressure gate parks on.

#[cfg(feature = "cpal")]
mod cpal_backend;
mod error;
mod memory;
mod null;
mod stream;
pub mod wait;

#[cfg(feature = "cpal")]
pub use cpal_backend::{CpalBackend, CpalStream};
pub use error::{HostError, HostResult};
pub use memory::{MemoryBackend, MemoryStream};
pub use null::{NullBackend, NullStream};
pub use stream::{HostBackend, HostStream, SampleEncoding, StreamSpec};
pub use wait::DrainSignal;
