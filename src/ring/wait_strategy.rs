//! Blocking wait strategy shared by producers and the consumer.
//!
//! Producers park here when the ring is full, the consumer parks here when
//! the ring is empty. The strategy spins briefly for low latency, then falls
//! back to a condition variable with a short re-check interval. A signal that
//! races ahead of the wait therefore costs at most one polling interval of
//! extra latency; this is a latency/CPU tradeoff, not a correctness
//! requirement.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Spin iterations before falling back to the condition variable
const SPIN_TRIES: usize = 100;

/// Upper bound on one blocked interval between predicate re-checks
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Condition-variable based wait with a bounded spin phase
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Park the calling thread until `ready` returns true.
    ///
    /// The predicate must only depend on state written by other threads with
    /// release ordering; it is re-evaluated after every wake-up or poll
    /// interval, so spurious wake-ups and missed signals are both benign.
    pub fn wait_until<F: Fn() -> bool>(&self, ready: F) {
        for _ in 0..SPIN_TRIES {
            if ready() {
                return;
            }
            std::hint::spin_loop();
        }

        let mut guard = self.mutex.lock();
        while !ready() {
            let _ = self.condvar.wait_for(&mut guard, POLL_INTERVAL);
        }
    }

    /// Wake every thread parked in `wait_until`
    pub fn signal_all(&self) {
        self.condvar.notify_all();
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}
