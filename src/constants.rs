//! Core constants used across the recorder pipeline.

/// Default ring buffer capacity hint (rounded to a power of 2 at construction)
pub const DEFAULT_RING_BUFFER_SIZE_HINT: i64 = 1024;

/// Hard upper bound on ring buffer capacity; larger hints are clamped
pub const MAX_RING_BUFFER_SIZE: usize = 1 << 30;

/// How long `close` waits for the dispatcher to drain before forcing a halt
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Per-kind retention limit of the bundled in-memory event handler
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
