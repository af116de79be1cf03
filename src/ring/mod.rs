//! Concurrent ring buffer substrate and its dispatcher.
//!
//! - [`RingBuffer`] - bounded MPSC claim/publish ring with blocking
//!   backpressure
//! - [`RecordEnvelope`] - reusable slot cell
//! - [`BlockingWaitStrategy`] - spin-then-condvar wait for full/empty rings
//! - [`Dispatcher`] - single consumer thread, strictly ordered drain

pub mod dispatcher;
pub mod ring_buffer;
pub mod slot;
pub mod wait_strategy;

pub use dispatcher::{Dispatcher, DispatcherStatus};
pub use ring_buffer::{PublishGuard, RingBuffer, Sequence};
pub use slot::RecordEnvelope;
pub use wait_strategy::BlockingWaitStrategy;
