use serde::Deserialize;

use crate::error::ConfigError;

/// Slots in the guest's audio-out port table.
pub const DEFAULT_CAPACITY: usize = 22;

/// Queued bytes above which `output` blocks its caller.
pub const DEFAULT_BACKPRESSURE_THRESHOLD: usize = 64 * 1024;

/// Tunables for a [`crate::PortManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AudioOutConfig {
    /// Number of port slots.
    pub capacity: usize,
    /// Unplayed bytes a host stream may hold before writers block.
    pub backpressure_threshold: usize,
    /// Scale submitted samples by the port's channel volumes.
    pub apply_gain: bool,
}

impl AudioOutConfig {
    /// Overrides the slot count.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Overrides the backpressure threshold.
    pub fn with_backpressure_threshold(mut self, bytes: usize) -> Self {
        self.backpressure_threshold = bytes;
        self
    }

    /// Enables or disables gain application on output.
    pub fn with_apply_gain(mut self, apply: bool) -> Self {
        self.apply_gain = apply;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.capacity > i32::MAX as usize {
            return Err(ConfigError::CapacityTooLarge(self.capacity));
        }
        Ok(())
    }
}

impl Default for AudioOutConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            backpressure_threshold: DEFAULT_BACKPRESSURE_THRESHOLD,
            apply_gain: false,
        }
    }
}
