//! Recorder facade owning the ring buffer and its dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::{compute_capacity, RecorderConfig};
use crate::error::Result;
use crate::handler::{InMemoryEventHandler, NamedQueueService};
use crate::payload::{
    NamedQueueGetRequest, NamedQueueGetResponse, NamedQueueKind, NamedQueuePayload,
};
use crate::ring::{Dispatcher, DispatcherStatus, PublishGuard, RingBuffer};

static INSTANCE: OnceCell<NamedQueueRecorder> = OnceCell::new();

/// Facade over the event-recording pipeline.
///
/// Producers call [`add_record`](Self::add_record) from request-serving
/// threads; one dedicated dispatcher thread drains the ring in strict
/// sequence order into the [`NamedQueueService`]. Administrative calls
/// (query, clear, persist) go straight to the service and never touch the
/// ring, so the read path is independent of the write path.
pub struct NamedQueueRecorder {
    ring: Arc<RingBuffer<NamedQueuePayload>>,
    dispatcher: Dispatcher,
    handler: Arc<dyn NamedQueueService>,
    shutdown_timeout: Duration,
    closed: AtomicBool,
}

impl NamedQueueRecorder {
    /// Build a recorder with an explicit handler and start its dispatcher.
    ///
    /// Embedding servers normally construct one recorder at startup and pass
    /// the handle to all callers; [`get_instance`](Self::get_instance) exists
    /// for code that needs process-wide single-instance semantics.
    pub fn new(config: RecorderConfig, handler: Arc<dyn NamedQueueService>) -> Result<Self> {
        let capacity = compute_capacity(config.ring_buffer_size_hint)?;
        let ring = Arc::new(RingBuffer::new(capacity)?);
        let dispatcher = Dispatcher::start(ring.clone(), handler.clone());
        info!(capacity, "started named queue recorder");

        Ok(Self {
            ring,
            dispatcher,
            handler,
            shutdown_timeout: config.shutdown_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Idempotent process-wide initializer.
    ///
    /// The first successful call constructs the recorder (with the bundled
    /// in-memory handler) and starts its dispatcher; every later call returns
    /// the existing instance and ignores its config argument.
    pub fn get_instance(config: RecorderConfig) -> Result<&'static NamedQueueRecorder> {
        INSTANCE
            .get_or_try_init(|| Self::new(config, Arc::new(InMemoryEventHandler::default())))
    }

    /// Record one event; the producer API.
    ///
    /// Claims the next sequence, writes the payload into its slot and
    /// publishes it. May block only on ring-buffer backpressure, never on
    /// administrative operations. Once the recorder is closed this is a
    /// silent no-op; a call racing the close transition may still be
    /// admitted.
    pub fn add_record(&self, payload: NamedQueuePayload) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let Ok(sequence) = self.ring.claim() else {
            // Ring shut down while we were parked; drop like any post-close
            // record.
            return;
        };
        // Publish runs on guard drop even if the slot write panics, so the
        // consumer never stalls waiting on this sequence.
        let guard = PublishGuard::new(&self.ring, sequence);
        // SAFETY: `sequence` was claimed by this call and is unpublished.
        unsafe { self.ring.slot_at(guard.sequence()).load(payload) };
    }

    /// Query in-memory records; synchronous delegation to the consumer
    /// capability
    pub fn get_named_queue_records(&self, request: &NamedQueueGetRequest) -> NamedQueueGetResponse {
        self.handler.get_records(request)
    }

    /// Clear one named queue; false if the queue is disabled or clearing
    /// fails
    pub fn clear_named_queue(&self, kind: NamedQueueKind) -> bool {
        self.handler.clear(kind)
    }

    /// Flush one named queue to the consumer's durable sink
    pub fn persist_all(&self, kind: NamedQueueKind) {
        self.handler.persist_all(kind);
    }

    /// Observable dispatcher phase, mainly for tests and operators
    pub fn status(&self) -> DispatcherStatus {
        self.dispatcher.status()
    }

    /// Whether `close` has been requested
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Two-phase shutdown: stop admissions, then drain.
    ///
    /// Sets the closed flag first so no new records are admitted, then asks
    /// the dispatcher to finish already-published sequences within the
    /// configured timeout. On timeout the dispatcher is halted immediately,
    /// abandoning undrained sequences; if even the halt is not confirmed
    /// (a handler wedged inside `on_event`), the worker thread is detached
    /// so `close` stays bounded by the timeout rather than by the handler.
    /// Calling `close` twice does not crash but makes no guarantees beyond
    /// that.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("closing named queue recorder");

        let mut halted = self.dispatcher.shutdown_graceful(self.shutdown_timeout);
        if !halted {
            warn!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "timed out draining named queue dispatcher; forcing halt"
            );
            halted = self.dispatcher.halt();
        }
        // Unpark any producer still inside claim; its record is dropped.
        self.ring.shutdown();
        if halted {
            self.dispatcher.join();
        } else {
            warn!("named queue dispatcher did not stop; detaching worker thread");
            self.dispatcher.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::CountingService;
    use crate::payload::WalEventRecord;

    fn wal_event(n: u64) -> NamedQueuePayload {
        NamedQueuePayload::WalEventTracker(WalEventRecord {
            wal_name: format!("wal.{n}"),
            state: "ROLLED".into(),
            wal_length: n,
            timestamp_ms: n,
        })
    }

    #[test]
    fn test_invalid_capacity_hint_fails_construction() {
        let handler = Arc::new(CountingService::default());
        let result = NamedQueueRecorder::new(RecorderConfig::new(-5), handler);
        assert!(result.is_err());
    }

    #[test]
    fn test_records_flow_to_handler() {
        let handler = Arc::new(CountingService::default());
        let recorder =
            NamedQueueRecorder::new(RecorderConfig::new(16), handler.clone()).unwrap();

        for n in 0..10 {
            recorder.add_record(wal_event(n));
        }
        recorder.close();

        assert_eq!(handler.count.load(Ordering::SeqCst), 10);
        assert_eq!(recorder.status(), DispatcherStatus::HaltedGraceful);
    }

    #[test]
    fn test_add_record_after_close_is_a_silent_noop() {
        let handler = Arc::new(CountingService::default());
        let recorder =
            NamedQueueRecorder::new(RecorderConfig::new(16), handler.clone()).unwrap();

        recorder.add_record(wal_event(1));
        recorder.close();
        let delivered = handler.count.load(Ordering::SeqCst);

        recorder.add_record(wal_event(2));
        recorder.add_record(wal_event(3));
        assert_eq!(handler.count.load(Ordering::SeqCst), delivered);
        assert!(recorder.is_closed());
    }

    #[test]
    fn test_get_instance_is_idempotent() {
        let first = NamedQueueRecorder::get_instance(RecorderConfig::new(64)).unwrap();
        // Second call must hand back the same instance and ignore its config.
        let second = NamedQueueRecorder::get_instance(RecorderConfig::new(4096)).unwrap();
        assert!(std::ptr::eq(first, second));
    }
}
