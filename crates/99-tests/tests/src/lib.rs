//! End-to-end tests for the audio-out port manager.

#[cfg(all(test, not(target_arch = "wasm32")))]
mod native_e2e;

#[cfg(test)]
mod tests {
    use audio_out::{OutputFormat, PortKind, PortManager};
    use host_audio::NullBackend;

    #[test]
    fn default_manager_exposes_full_table() {
        let manager = PortManager::with_defaults(NullBackend::new_handle());
        assert_eq!(manager.capacity(), 22);
        for kind in 0..22 {
            manager
                .open(PortKind(kind), 256, 48_000, OutputFormat::S16_STEREO)
                .expect("slot available");
        }
        assert_eq!(manager.open_ports(), 22);
        assert!(manager
            .open(PortKind(0), 256, 48_000, OutputFormat::S16_STEREO)
            .is_err());
    }
}
