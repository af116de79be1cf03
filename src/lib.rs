//! Embedded named-queue event recorder.
//!
//! An in-process, low-overhead pipeline for diagnostic events inside a
//! storage server: request-serving threads record tagged payloads
//! (slow-operation records, balancer decisions, WAL events) and a single
//! dedicated thread drains them in strict order into a pluggable consumer.
//!
//! ## Components
//!
//! | Component | Type | Role |
//! |-----------|------|------|
//! | Ring substrate | [`ring::RingBuffer`] | MPSC claim/publish, blocking backpressure |
//! | Dispatcher | [`ring::Dispatcher`] | Single consumer thread, ordered drain |
//! | Facade | [`NamedQueueRecorder`] | Producer + administrative API, lifecycle |
//! | Consumer capability | [`NamedQueueService`] | Per-kind query/clear/persist logic |
//!
//! ## Usage
//!
//! ```no_run
//! use namequeue::{NamedQueueRecorder, RecorderConfig, NamedQueuePayload, WalEventRecord};
//!
//! let recorder = NamedQueueRecorder::get_instance(RecorderConfig::default()).unwrap();
//! recorder.add_record(NamedQueuePayload::WalEventTracker(WalEventRecord {
//!     wal_name: "wal.1".into(),
//!     state: "ROLLED".into(),
//!     wal_length: 4096,
//!     timestamp_ms: 0,
//! }));
//! ```
//!
//! Producers block only when the ring is full (bounded memory, no loss);
//! consumption order always equals publish order. `close` drains gracefully
//! within a timeout, then forces a halt.

pub mod config;
pub mod constants;
pub mod error;
pub mod handler;
pub mod payload;
pub mod recorder;
pub mod ring;

pub use config::{compute_capacity, RecorderConfig};
pub use error::{NamedQueueError, Result};
pub use handler::{InMemoryEventHandler, NamedQueueService, PersistenceSink};
pub use payload::{
    BalancerDecisionRecord, BalancerRejectionRecord, NamedQueueGetRequest, NamedQueueGetResponse,
    NamedQueueKind, NamedQueuePayload, SlowLogRecord, WalEventRecord,
};
pub use recorder::NamedQueueRecorder;
pub use ring::{Dispatcher, DispatcherStatus, RingBuffer};
