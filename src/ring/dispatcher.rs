//! Single-threaded dispatcher draining the ring buffer in sequence order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::handler::NamedQueueService;
use crate::payload::NamedQueuePayload;
use crate::ring::ring_buffer::RingBuffer;

/// How long `halt` waits for the loop to confirm exit before the caller
/// gives up and detaches the worker thread
const HALT_CONFIRM_TIMEOUT: Duration = Duration::from_millis(100);

/// Observable phase of the dispatcher thread.
///
/// `Running → Draining → HaltedGraceful` is the normal shutdown path;
/// `HaltedForced` is reached when the drain deadline expires and leaves any
/// published-but-undrained sequences permanently unconsumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherStatus {
    Running = 0,
    Draining = 1,
    HaltedGraceful = 2,
    HaltedForced = 3,
}

impl DispatcherStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            2 => Self::HaltedGraceful,
            _ => Self::HaltedForced,
        }
    }
}

struct DispatcherControl {
    phase: AtomicU8,
    done: Mutex<bool>,
    done_cv: Condvar,
}

impl DispatcherControl {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(DispatcherStatus::Running as u8),
            done: Mutex::new(false),
            done_cv: Condvar::new(),
        }
    }

    fn status(&self) -> DispatcherStatus {
        DispatcherStatus::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn request(&self, status: DispatcherStatus) {
        self.phase.store(status as u8, Ordering::Release);
    }

    /// Move `Running → Draining`; a no-op once the loop has already halted
    fn request_drain(&self) {
        let _ = self.phase.compare_exchange(
            DispatcherStatus::Running as u8,
            DispatcherStatus::Draining as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Move `Running | Draining → HaltedForced`, preserving an
    /// already-halted status so a drain that finished just before the force
    /// is not misreported
    fn request_halt(&self) {
        let _ = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |phase| {
                (phase == DispatcherStatus::Running as u8
                    || phase == DispatcherStatus::Draining as u8)
                    .then_some(DispatcherStatus::HaltedForced as u8)
            });
    }

    fn mark_done(&self, status: DispatcherStatus) {
        self.request(status);
        let mut done = self.done.lock();
        *done = true;
        self.done_cv.notify_all();
    }

    /// Wait until the drain loop has exited; returns false on timeout
    fn wait_done(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.done_cv.wait_until(&mut done, deadline).timed_out() {
                break;
            }
        }
        *done
    }
}

/// Owns the dedicated consumer thread that drains the ring buffer and feeds
/// the [`NamedQueueService`] one event at a time, in sequence order.
pub struct Dispatcher {
    ring: Arc<RingBuffer<NamedQueuePayload>>,
    control: Arc<DispatcherControl>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the dispatcher thread over the given ring and event handler
    pub fn start(
        ring: Arc<RingBuffer<NamedQueuePayload>>,
        handler: Arc<dyn NamedQueueService>,
    ) -> Self {
        let control = Arc::new(DispatcherControl::new());

        let thread_ring = ring.clone();
        let thread_control = control.clone();
        let join = std::thread::Builder::new()
            .name("namequeue.append".into())
            .spawn(move || run_loop(thread_ring, handler, thread_control))
            .expect("failed to spawn namequeue dispatcher thread");

        Self {
            ring,
            control,
            join: Mutex::new(Some(join)),
        }
    }

    pub fn status(&self) -> DispatcherStatus {
        self.control.status()
    }

    /// Ask the drain loop to finish already-published sequences and stop.
    /// Returns true if it halted within `timeout`.
    pub fn shutdown_graceful(&self, timeout: Duration) -> bool {
        self.control.request_drain();
        self.ring.signal_consumer();
        self.control.wait_done(timeout)
    }

    /// Stop the drain loop at its next iteration, abandoning undrained
    /// sequences.
    ///
    /// Returns true once the loop has confirmed its exit. The forced flag is
    /// only observed between events, so false means the thread is wedged
    /// inside `on_event`; the caller must [`detach`](Self::detach) it rather
    /// than join, or it would inherit the handler's stall.
    pub fn halt(&self) -> bool {
        self.control.request_halt();
        self.ring.signal_consumer();
        self.control.wait_done(HALT_CONFIRM_TIMEOUT)
    }

    /// Tear down the worker thread; the loop must already have been asked to
    /// stop
    pub fn join(&self) {
        let handle = self.join.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("namequeue dispatcher thread terminated abnormally");
            }
        }
    }

    /// Abandon the worker thread without waiting for it. Used when a wedged
    /// handler would otherwise block the caller indefinitely; the thread
    /// observes the forced flag and exits on its own if the handler ever
    /// returns.
    pub fn detach(&self) {
        drop(self.join.lock().take());
    }
}

fn run_loop(
    ring: Arc<RingBuffer<NamedQueuePayload>>,
    handler: Arc<dyn NamedQueueService>,
    control: Arc<DispatcherControl>,
) {
    let mut cursor: u64 = 0;

    loop {
        let phase = control.status();
        if phase == DispatcherStatus::HaltedForced {
            control.mark_done(DispatcherStatus::HaltedForced);
            return;
        }

        if ring.is_published(cursor) {
            // SAFETY: single-consumer discipline; `cursor` is published and
            // has not been consumed before.
            let payload = unsafe { ring.take(cursor) };
            let sequence = cursor;
            cursor += 1;
            ring.advance_consumer(cursor);

            if let Some(payload) = payload {
                let kind = payload.kind();
                // Isolate per-event failures: a panicking handler must not
                // stop the loop or corrupt ring state.
                let outcome = catch_unwind(AssertUnwindSafe(|| handler.on_event(payload)));
                if outcome.is_err() {
                    error!(
                        sequence,
                        kind = kind.as_str(),
                        "named queue handler failed while processing event; skipping"
                    );
                }
            }
            continue;
        }

        match phase {
            DispatcherStatus::Running => {
                let c = &control;
                ring.wait_for_publish(cursor, || {
                    c.status() != DispatcherStatus::Running
                });
            }
            DispatcherStatus::Draining => {
                // Everything published before the drain request is behind the
                // claim cursor; once we catch up to it nothing more can
                // arrive because admissions stopped before the drain began.
                if cursor >= ring.claimed() {
                    debug!(cursor, "namequeue dispatcher drained");
                    control.mark_done(DispatcherStatus::HaltedGraceful);
                    return;
                }
                // A claimed-but-unpublished sequence is imminent (publish is
                // guaranteed by the producer's scoped guard); wait for it.
                let c = &control;
                ring.wait_for_publish(cursor, || {
                    c.status() == DispatcherStatus::HaltedForced
                });
            }
            DispatcherStatus::HaltedGraceful | DispatcherStatus::HaltedForced => {
                control.mark_done(phase);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::CountingService;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            DispatcherStatus::from_u8(DispatcherStatus::Draining as u8),
            DispatcherStatus::Draining
        );
        assert_eq!(
            DispatcherStatus::from_u8(DispatcherStatus::HaltedForced as u8),
            DispatcherStatus::HaltedForced
        );
    }

    #[test]
    fn test_graceful_shutdown_of_idle_dispatcher() {
        let ring = Arc::new(RingBuffer::new(8).unwrap());
        let handler = Arc::new(CountingService::default());
        let dispatcher = Dispatcher::start(ring, handler);

        assert_eq!(dispatcher.status(), DispatcherStatus::Running);
        assert!(dispatcher.shutdown_graceful(Duration::from_secs(1)));
        dispatcher.join();
        assert_eq!(dispatcher.status(), DispatcherStatus::HaltedGraceful);
    }
}
