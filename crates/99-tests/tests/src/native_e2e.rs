#![cfg(all(test, not(target_arch = "wasm32")))]

use audio_out::{
    AudioOutConfig, AudioOutError, OutputFormat, PortHandle, PortKind, PortManager, ERROR_GENERIC,
    VOLUME_0DB,
};
use host_audio::{HostStream, MemoryBackend};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THRESHOLD: usize = 2048;

fn manager_on(backend: &Arc<MemoryBackend>, config: AudioOutConfig) -> Arc<PortManager> {
    let backend = Arc::clone(backend);
    Arc::new(PortManager::new(backend, config).expect("valid config"))
}

fn s16_frame(left: i16, right: i16) -> [u8; 4] {
    let [l0, l1] = left.to_le_bytes();
    let [r0, r1] = right.to_le_bytes();
    [l0, l1, r0, r1]
}

#[test]
fn concurrent_opens_fill_table_exactly_once() {
    let _ = env_logger::builder().is_test(true).try_init();
    const THREADS: usize = 30;
    let backend = Arc::new(MemoryBackend::new());
    let manager = manager_on(&backend, AudioOutConfig::default());
    let capacity = manager.capacity();
    let barrier = Arc::new(Barrier::new(THREADS));
    let opened = Arc::new(Mutex::new(Vec::new()));
    let refused = Arc::new(Mutex::new(0usize));

    let threads: Vec<_> = (0..THREADS)
        .map(|kind| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            let opened = Arc::clone(&opened);
            let refused = Arc::clone(&refused);
            thread::spawn(move || {
                barrier.wait();
                match manager.open(PortKind(kind as i32), 128, 48_000, OutputFormat::F32_STEREO) {
                    Ok(handle) => opened.lock().push(handle),
                    Err(AudioOutError::NoFreePorts { .. }) => *refused.lock() += 1,
                    Err(err) => panic!("unexpected open failure: {err}"),
                }
            })
        })
        .collect();
    for worker in threads {
        worker.join().unwrap();
    }

    let opened = opened.lock();
    assert_eq!(opened.len(), capacity);
    assert_eq!(*refused.lock(), THREADS - capacity);
    let unique: HashSet<u32> = opened.iter().map(|handle| handle.get()).collect();
    assert_eq!(unique, (1..=capacity as u32).collect());
    assert_eq!(backend.opened_count(), capacity);
}

#[test]
fn gated_writers_deliver_buffers_in_order() {
    let backend = Arc::new(
        MemoryBackend::new()
            .recording()
            .draining(512, Duration::from_micros(100)),
    );
    let config = AudioOutConfig::default()
        .with_capacity(4)
        .with_backpressure_threshold(THRESHOLD);
    let manager = manager_on(&backend, config);

    // Opened sequentially so stream `i` belongs to handle `i + 1`.
    let handles: Vec<PortHandle> = (0..4)
        .map(|kind| {
            manager
                .open(PortKind(kind), 256, 48_000, OutputFormat::S16_STEREO)
                .unwrap()
        })
        .collect();

    let writers: Vec<_> = handles
        .iter()
        .map(|&handle| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for sequence in 0..12u8 {
                    let buffer = vec![sequence; 256 * 4];
                    assert_eq!(manager.output(handle, Some(buffer.as_slice())).unwrap(), 256);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    for (index, &handle) in handles.iter().enumerate() {
        let stream = backend.stream(index).unwrap();
        assert!(stream.queued_bytes() <= THRESHOLD);
        let submissions = stream.submissions();
        assert_eq!(submissions.len(), 12);
        for (sequence, buffer) in submissions.iter().enumerate() {
            assert_eq!(buffer.len(), 256 * 4);
            assert!(buffer.iter().all(|&byte| byte == sequence as u8));
        }
        let metrics = manager.metrics(handle).unwrap();
        assert_eq!(metrics.buffers, 12);
        assert_eq!(metrics.bytes, 12 * 256 * 4);
    }
}

#[test]
fn volume_changes_race_with_gain_output() {
    let backend = Arc::new(
        MemoryBackend::new()
            .recording()
            .draining(4096, Duration::from_micros(50)),
    );
    let config = AudioOutConfig::default()
        .with_capacity(2)
        .with_backpressure_threshold(THRESHOLD)
        .with_apply_gain(true);
    let manager = manager_on(&backend, config);
    let handle = manager
        .open(PortKind(0), 64, 48_000, OutputFormat::S16_STEREO)
        .unwrap();
    let stream = backend.last_stream().unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let mixer = {
        let manager = Arc::clone(&manager);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut flip = false;
            while !stop.load(Ordering::Acquire) {
                let gain = if flip { VOLUME_0DB } else { VOLUME_0DB / 2 };
                manager.set_volume(handle, 0b11, &[gain; 8]).unwrap();
                flip = !flip;
            }
        })
    };

    let buffer: Vec<u8> = (0..64).flat_map(|_| s16_frame(1000, -1000)).collect();
    for _ in 0..200 {
        manager.output(handle, Some(buffer.as_slice())).unwrap();
    }
    stop.store(true, Ordering::Release);
    mixer.join().unwrap();

    // Each buffer was scaled by a single gain snapshot.
    for submission in stream.submissions() {
        assert_eq!(submission.len(), buffer.len());
        let first = i16::from_le_bytes([submission[0], submission[1]]);
        assert!(first == 1000 || first == 500, "unexpected sample {first}");
        for frame in submission.chunks_exact(4) {
            assert_eq!(frame, &s16_frame(first, -first)[..]);
        }
    }
}

#[test]
fn host_failures_surface_as_generic_errors() {
    let backend = Arc::new(MemoryBackend::new());
    let manager = manager_on(&backend, AudioOutConfig::default().with_capacity(2));

    backend.set_refuse_open(true);
    let err = manager
        .open(PortKind(0), 256, 48_000, OutputFormat::S16_MONO)
        .unwrap_err();
    assert!(matches!(err, AudioOutError::HostOpenFailed(_)));
    assert_eq!(err.code(), ERROR_GENERIC);
    assert_eq!(manager.open_ports(), 0);

    backend.set_refuse_open(false);
    let handle = manager
        .open(PortKind(0), 256, 48_000, OutputFormat::S16_MONO)
        .unwrap();
    assert_eq!(handle.get(), 1);

    let stream = backend.last_stream().unwrap();
    stream.set_reject(true);
    let err = manager.output(handle, Some(&[0u8; 512][..])).unwrap_err();
    assert!(matches!(err, AudioOutError::SubmitFailed(_)));
    assert_eq!(err.code(), ERROR_GENERIC);
    assert_eq!(manager.metrics(handle).unwrap().rejected, 1);

    stream.set_reject(false);
    assert_eq!(manager.output(handle, Some(&[0u8; 512][..])).unwrap(), 256);
    assert_eq!(stream.submitted_bytes(), 512);
}

#[test]
fn dropping_manager_releases_every_stream() {
    let backend = Arc::new(MemoryBackend::new());
    let manager = manager_on(&backend, AudioOutConfig::default().with_capacity(6));
    for format in OutputFormat::ALL.into_iter().take(6) {
        manager.open(PortKind(0), 256, 48_000, format).unwrap();
    }
    assert_eq!(backend.live_streams(), 6);
    drop(manager);
    assert_eq!(backend.live_streams(), 0);
}
