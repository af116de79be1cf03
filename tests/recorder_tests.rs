//! Integration tests for the recorder pipeline: delivery, ordering,
//! lifecycle and failure isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use namequeue::{
    DispatcherStatus, InMemoryEventHandler, NamedQueueGetRequest, NamedQueueGetResponse,
    NamedQueueKind, NamedQueuePayload, NamedQueueRecorder, NamedQueueService, RecorderConfig,
    WalEventRecord,
};

fn wal_event(producer: u64, n: u64) -> NamedQueuePayload {
    NamedQueuePayload::WalEventTracker(WalEventRecord {
        wal_name: format!("wal.{producer}.{n}"),
        state: "ROLLED".into(),
        wal_length: n,
        timestamp_ms: producer,
    })
}

/// Collects every delivered (producer, n) pair in arrival order
#[derive(Default)]
struct CollectingService {
    seen: Mutex<Vec<(u64, u64)>>,
}

impl NamedQueueService for CollectingService {
    fn on_event(&self, payload: NamedQueuePayload) {
        if let NamedQueuePayload::WalEventTracker(record) = payload {
            self.seen.lock().push((record.timestamp_ms, record.wal_length));
        }
    }

    fn get_records(&self, request: &NamedQueueGetRequest) -> NamedQueueGetResponse {
        NamedQueueGetResponse {
            kind: request.kind,
            records: Vec::new(),
        }
    }

    fn clear(&self, _kind: NamedQueueKind) -> bool {
        true
    }

    fn persist_all(&self, _kind: NamedQueueKind) {}
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 250;

    let handler = Arc::new(CollectingService::default());
    let recorder = Arc::new(
        NamedQueueRecorder::new(RecorderConfig::new(1024), handler.clone()).unwrap(),
    );

    let threads: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let recorder = recorder.clone();
            thread::spawn(move || {
                for n in 0..PER_PRODUCER {
                    recorder.add_record(wal_event(producer, n));
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().unwrap();
    }

    recorder.close();

    let seen = handler.seen.lock();
    assert_eq!(seen.len(), (PRODUCERS * PER_PRODUCER) as usize);

    // Each producer's records arrive in the order it published them.
    for producer in 0..PRODUCERS {
        let values: Vec<u64> = seen
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, n)| *n)
            .collect();
        assert_eq!(values, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[test]
fn test_graceful_close_delivers_everything_published() {
    init_tracing();
    let handler = Arc::new(CollectingService::default());
    let recorder =
        NamedQueueRecorder::new(RecorderConfig::new(256), handler.clone()).unwrap();

    for n in 0..100 {
        recorder.add_record(wal_event(0, n));
    }
    recorder.close();

    let seen = handler.seen.lock();
    assert_eq!(seen.len(), 100);
    let values: Vec<u64> = seen.iter().map(|(_, n)| *n).collect();
    assert_eq!(values, (0..100).collect::<Vec<_>>());
    assert_eq!(recorder.status(), DispatcherStatus::HaltedGraceful);
}

#[test]
fn test_post_close_records_never_reach_consumer_and_never_block() {
    let handler = Arc::new(CollectingService::default());
    let recorder =
        NamedQueueRecorder::new(RecorderConfig::new(4), handler.clone()).unwrap();
    recorder.close();

    // Far more records than the ring holds: must neither block nor deliver.
    let start = Instant::now();
    for n in 0..64 {
        recorder.add_record(wal_event(0, n));
    }
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(handler.seen.lock().is_empty());
}

#[test]
fn test_handler_panic_does_not_stop_the_pipeline() {
    struct PanickyService {
        delivered: AtomicUsize,
    }

    impl NamedQueueService for PanickyService {
        fn on_event(&self, payload: NamedQueuePayload) {
            if let NamedQueuePayload::WalEventTracker(record) = &payload {
                if record.wal_length == 3 {
                    panic!("injected handler failure");
                }
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }

        fn get_records(&self, request: &NamedQueueGetRequest) -> NamedQueueGetResponse {
            NamedQueueGetResponse {
                kind: request.kind,
                records: Vec::new(),
            }
        }

        fn clear(&self, _kind: NamedQueueKind) -> bool {
            true
        }

        fn persist_all(&self, _kind: NamedQueueKind) {}
    }

    let handler = Arc::new(PanickyService {
        delivered: AtomicUsize::new(0),
    });
    let recorder =
        NamedQueueRecorder::new(RecorderConfig::new(16), handler.clone()).unwrap();

    for n in 0..10 {
        recorder.add_record(wal_event(0, n));
    }
    recorder.close();

    // Event 3 panicked inside the handler; the other 9 still arrived.
    assert_eq!(handler.delivered.load(Ordering::SeqCst), 9);
    assert_eq!(recorder.status(), DispatcherStatus::HaltedGraceful);
}

#[test]
fn test_administrative_path_with_in_memory_handler() {
    let handler = Arc::new(InMemoryEventHandler::default());
    let recorder =
        NamedQueueRecorder::new(RecorderConfig::new(64), handler).unwrap();

    for n in 0..5 {
        recorder.add_record(wal_event(0, n));
    }

    // The read path is asynchronous to the write path; poll until the
    // dispatcher has caught up.
    assert!(wait_for(
        || {
            recorder
                .get_named_queue_records(&NamedQueueGetRequest::new(
                    NamedQueueKind::WalEventTracker,
                ))
                .records
                .len()
                == 5
        },
        Duration::from_secs(5),
    ));

    assert!(recorder.clear_named_queue(NamedQueueKind::WalEventTracker));
    let response = recorder
        .get_named_queue_records(&NamedQueueGetRequest::new(NamedQueueKind::WalEventTracker));
    assert!(response.records.is_empty());

    recorder.close();
}

#[test]
fn test_status_is_running_until_close() {
    let handler = Arc::new(CollectingService::default());
    let recorder = NamedQueueRecorder::new(RecorderConfig::new(16), handler).unwrap();

    assert_eq!(recorder.status(), DispatcherStatus::Running);
    assert!(!recorder.is_closed());

    recorder.close();
    assert!(recorder.is_closed());
    assert!(matches!(
        recorder.status(),
        DispatcherStatus::HaltedGraceful | DispatcherStatus::HaltedForced
    ));
}

#[test]
fn test_forced_halt_after_stuck_handler() {
    /// Blocks the dispatcher thread long enough to blow the drain deadline
    struct StuckService;

    impl NamedQueueService for StuckService {
        fn on_event(&self, _payload: NamedQueuePayload) {
            thread::sleep(Duration::from_millis(500));
        }

        fn get_records(&self, request: &NamedQueueGetRequest) -> NamedQueueGetResponse {
            NamedQueueGetResponse {
                kind: request.kind,
                records: Vec::new(),
            }
        }

        fn clear(&self, _kind: NamedQueueKind) -> bool {
            true
        }

        fn persist_all(&self, _kind: NamedQueueKind) {}
    }

    init_tracing();
    let config = RecorderConfig::new(64).with_shutdown_timeout(Duration::from_millis(50));
    let recorder = NamedQueueRecorder::new(config, Arc::new(StuckService)).unwrap();

    for n in 0..8 {
        recorder.add_record(wal_event(0, n));
    }
    recorder.close();

    assert_eq!(recorder.status(), DispatcherStatus::HaltedForced);
}

#[test]
fn test_close_stays_bounded_when_handler_never_returns_in_time() {
    /// Wedges the dispatcher thread for far longer than the close deadline
    struct WedgedService;

    impl NamedQueueService for WedgedService {
        fn on_event(&self, _payload: NamedQueuePayload) {
            thread::sleep(Duration::from_secs(10));
        }

        fn get_records(&self, request: &NamedQueueGetRequest) -> NamedQueueGetResponse {
            NamedQueueGetResponse {
                kind: request.kind,
                records: Vec::new(),
            }
        }

        fn clear(&self, _kind: NamedQueueKind) -> bool {
            true
        }

        fn persist_all(&self, _kind: NamedQueueKind) {}
    }

    init_tracing();
    let config = RecorderConfig::new(16).with_shutdown_timeout(Duration::from_millis(50));
    let recorder = NamedQueueRecorder::new(config, Arc::new(WedgedService)).unwrap();

    recorder.add_record(wal_event(0, 0));
    recorder.add_record(wal_event(0, 1));

    // close() is bounded by its timeout (plus the forced-halt confirmation
    // window), never by how long the handler keeps running: the wedged
    // worker thread is detached instead of joined.
    let start = Instant::now();
    recorder.close();
    assert!(
        start.elapsed() < Duration::from_secs(3),
        "close took {:?}, waiting on the wedged handler",
        start.elapsed()
    );
    assert_eq!(recorder.status(), DispatcherStatus::HaltedForced);
}
