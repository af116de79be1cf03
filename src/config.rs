//! Recorder configuration and capacity policy.

use std::time::Duration;

use crate::constants::{
    DEFAULT_RING_BUFFER_SIZE_HINT, DEFAULT_SHUTDOWN_TIMEOUT_MS, MAX_RING_BUFFER_SIZE,
};
use crate::error::{NamedQueueError, Result};

/// Configuration for the named queue recorder
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Requested ring buffer capacity; rounded up to a power of 2 and
    /// clamped to `MAX_RING_BUFFER_SIZE`
    pub ring_buffer_size_hint: i64,
    /// How long `close` waits for a graceful drain before forcing a halt
    pub shutdown_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ring_buffer_size_hint: DEFAULT_RING_BUFFER_SIZE_HINT,
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }
}

impl RecorderConfig {
    /// Create a configuration with the given capacity hint
    pub fn new(ring_buffer_size_hint: i64) -> Self {
        Self {
            ring_buffer_size_hint,
            ..Default::default()
        }
    }

    /// Set the graceful shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Derive a valid ring buffer capacity from a configured hint.
///
/// The ring buffer requires a power-of-2 capacity for mask-based index
/// arithmetic. A hint that already is a power of 2 is used unchanged,
/// anything else is rounded up. Hints above `MAX_RING_BUFFER_SIZE` are
/// clamped rather than rejected; a negative hint is a configuration error.
pub fn compute_capacity(hint: i64) -> Result<usize> {
    if hint < 0 {
        return Err(NamedQueueError::config(format!(
            "ring buffer size hint must be non-negative, got {hint}"
        )));
    }
    if hint as u64 >= MAX_RING_BUFFER_SIZE as u64 {
        return Ok(MAX_RING_BUFFER_SIZE);
    }
    let capacity = (hint as usize).max(1).next_power_of_two();
    Ok(capacity.min(MAX_RING_BUFFER_SIZE))
}
