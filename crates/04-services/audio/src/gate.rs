//! Backpressure gate: blocks a writer until its host stream drains.
//!
//! Runs with no table lock held. There is no timeout; the caller returns only
//! once the stream's queued byte count is at or below the threshold.

use std::thread;

use host_audio::HostStream;

/// Blocks until `stream.queued_bytes() <= threshold`.
///
/// Streams with a drain signal are parked on it; others are polled with
/// `yield_now`. Returns how many times the caller parked or yielded.
pub(crate) fn wait_for_drain(stream: &dyn HostStream, threshold: usize) -> usize {
    let mut rounds = 0;
    match stream.drain_signal() {
        Some(signal) => loop {
            // Epoch first, then level: a drain between the two is not lost.
            let epoch = signal.epoch();
            if stream.queued_bytes() <= threshold {
                return rounds;
            }
            signal.wait(epoch);
            rounds += 1;
        },
        None => {
            while stream.queued_bytes() > threshold {
                thread::yield_now();
                rounds += 1;
            }
            rounds
        }
    }
}
