//! Open/close/status behaviour of the port table.

use std::collections::HashSet;
use std::sync::Arc;

use audio_out::{
    AudioOutConfig, AudioOutError, OutputFormat, PortHandle, PortKind, PortManager,
    ERROR_INVALID_PORT,
};
use host_audio::MemoryBackend;

fn manager(capacity: usize) -> (Arc<MemoryBackend>, PortManager) {
    let backend = Arc::new(MemoryBackend::new());
    let manager = PortManager::new(
        backend.clone(),
        AudioOutConfig::default().with_capacity(capacity),
    )
    .expect("valid config");
    (backend, manager)
}

/// Handles are unique, in range, and the pool reports exhaustion.
#[test]
fn handles_unique_until_exhausted() {
    let (_backend, manager) = manager(5);
    let mut seen = HashSet::new();
    for _ in 0..5 {
        let handle = manager
            .open(PortKind(0), 256, 48_000, OutputFormat::S16_STEREO)
            .expect("free slot");
        assert!((1..=5).contains(&handle.get()));
        assert!(seen.insert(handle), "duplicate handle {handle}");
    }

    let err = manager
        .open(PortKind(0), 256, 48_000, OutputFormat::S16_STEREO)
        .unwrap_err();
    assert!(matches!(err, AudioOutError::NoFreePorts { capacity: 5 }));
    assert_eq!(err.code(), -1);
}

/// Output on unopened or out-of-range handles fails without touching streams.
#[test]
fn output_on_bad_handles_is_invalid_port() {
    let (backend, manager) = manager(2);
    let open = manager
        .open(PortKind(0), 4, 48_000, OutputFormat::S16_MONO)
        .unwrap();
    let buffer = [0u8; 8];

    let closed = PortHandle::new(2).unwrap();
    let far = PortHandle::new(99).unwrap();
    for handle in [closed, far] {
        let err = manager.output(handle, Some(buffer.as_slice())).unwrap_err();
        assert!(matches!(err, AudioOutError::InvalidPort(_)));
        assert_eq!(err.code(), ERROR_INVALID_PORT);
    }
    assert!(matches!(
        manager.output(far, None),
        Err(AudioOutError::InvalidPort(99))
    ));

    assert_eq!(backend.stream(0).unwrap().submitted_bytes(), 0);
    assert_eq!(manager.metrics(open).unwrap().buffers, 0);
}

/// A missing buffer is a successful no-op on any open port.
#[test]
fn null_output_submits_nothing() {
    let (backend, manager) = manager(OutputFormat::ALL.len());
    for format in OutputFormat::ALL {
        let handle = manager.open(PortKind(1), 128, 48_000, format).unwrap();
        assert_eq!(manager.output(handle, None).unwrap(), 0);
    }
    for index in 0..OutputFormat::ALL.len() {
        assert_eq!(backend.stream(index).unwrap().submitted_bytes(), 0);
    }
}

/// A full buffer is submitted at exactly `samples * bytes * channels` bytes.
#[test]
fn output_submits_exact_buffer_length() {
    let (backend, manager) = manager(1);
    let handle = manager
        .open(PortKind(0), 64, 48_000, OutputFormat::F32_8CH)
        .unwrap();
    let oversized = vec![0u8; 64 * 4 * 8 + 100];
    assert_eq!(manager.output(handle, Some(oversized.as_slice())).unwrap(), 64);
    assert_eq!(
        backend.last_stream().unwrap().submitted_bytes(),
        64 * 4 * 8
    );
    let metrics = manager.metrics(handle).unwrap();
    assert_eq!(metrics.buffers, 1);
    assert_eq!(metrics.bytes, 64 * 4 * 8);
}

/// Status reflects open-time kind and translated channel count, and a
/// reopened slot reflects the new format.
#[test]
fn status_round_trip_and_reopen() {
    let (backend, manager) = manager(1);
    let handle = manager
        .open(PortKind(3), 256, 48_000, OutputFormat::S16_STEREO)
        .unwrap();
    let status = manager.status(handle).unwrap();
    assert_eq!(status.kind, PortKind(3));
    assert_eq!(status.channels, 2);
    assert_eq!(status.format, OutputFormat::S16_STEREO);

    manager.close(handle).unwrap();
    assert!(matches!(
        manager.status(handle),
        Err(AudioOutError::InvalidPort(1))
    ));
    assert_eq!(backend.live_streams(), 0);

    let reopened = manager
        .open(PortKind(127), 256, 48_000, OutputFormat::F32_8CH_STD)
        .unwrap();
    assert_eq!(reopened, handle);
    let status = manager.status(reopened).unwrap();
    assert_eq!(status.kind, PortKind(127));
    assert_eq!(status.channels, 8);
}

/// Closing twice or closing an unopened slot is an invalid port.
#[test]
fn close_requires_open_port() {
    let (_backend, manager) = manager(2);
    let handle = manager
        .open(PortKind(0), 256, 48_000, OutputFormat::S16_MONO)
        .unwrap();
    manager.close(handle).unwrap();
    assert!(matches!(
        manager.close(handle),
        Err(AudioOutError::InvalidPort(_))
    ));
    assert!(manager.close(PortHandle::new(3).unwrap()).is_err());
}

/// Raw handles of zero or below never resolve.
#[test]
fn raw_handles_below_one_are_rejected() {
    for raw in [0, -1, i32::MIN] {
        let err = PortHandle::try_from(raw).unwrap_err();
        assert_eq!(err.code(), ERROR_INVALID_PORT);
    }
}

/// The raw open path accepts every enumerated format.
#[test]
fn open_raw_accepts_known_formats() {
    let (_backend, manager) = manager(8);
    for raw in 0..8 {
        let handle = manager.open_raw(PortKind(0), 256, 48_000, raw).unwrap();
        let status = manager.status(handle).unwrap();
        assert_eq!(status.format.to_raw(), raw);
    }
}
