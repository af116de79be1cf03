//! Consumer capability: per-kind interpretation of drained events.
//!
//! The ring buffer substrate knows nothing about queue kinds; everything
//! kind-specific lives behind [`NamedQueueService`]. The bundled
//! [`InMemoryEventHandler`] keeps a bounded newest-first window per kind and
//! is what `NamedQueueRecorder::get_instance` wires in; embedding servers
//! with their own storage substitute their own implementation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::constants::DEFAULT_QUEUE_CAPACITY;
use crate::payload::{
    NamedQueueGetRequest, NamedQueueGetResponse, NamedQueueKind, NamedQueuePayload,
};

/// Capability interface implemented by the consumer of drained events.
///
/// `on_event` runs on the dispatcher thread, once per drained slot, in
/// sequence order. The administrative methods run on caller threads and may
/// race with `on_event`; implementations synchronize internally.
pub trait NamedQueueService: Send + Sync {
    /// Interpret one drained event
    fn on_event(&self, payload: NamedQueuePayload);

    /// Query in-memory records for one queue kind
    fn get_records(&self, request: &NamedQueueGetRequest) -> NamedQueueGetResponse;

    /// Drop all retained records for one queue kind; false if the kind is
    /// disabled or clearing fails
    fn clear(&self, kind: NamedQueueKind) -> bool;

    /// Flush retained records for one queue kind to the durable sink, if any
    fn persist_all(&self, kind: NamedQueueKind);
}

/// Durable destination for [`NamedQueueService::persist_all`]. The sink alone
/// decides the storage format.
pub trait PersistenceSink: Send + Sync {
    fn persist(&self, kind: NamedQueueKind, records: &[NamedQueuePayload]);
}

/// In-memory consumer keeping a bounded, newest-first window per queue kind
pub struct InMemoryEventHandler {
    queues: Mutex<HashMap<NamedQueueKind, VecDeque<NamedQueuePayload>>>,
    enabled: HashSet<NamedQueueKind>,
    queue_capacity: usize,
    sink: Option<Arc<dyn PersistenceSink>>,
}

impl InMemoryEventHandler {
    pub fn new(enabled: impl IntoIterator<Item = NamedQueueKind>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            enabled: enabled.into_iter().collect(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sink: None,
        }
    }

    /// Enable every known queue kind
    pub fn all_kinds() -> Self {
        Self::new([
            NamedQueueKind::SlowLog,
            NamedQueueKind::BalancerDecision,
            NamedQueueKind::BalancerRejection,
            NamedQueueKind::WalEventTracker,
        ])
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_persistence_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl Default for InMemoryEventHandler {
    fn default() -> Self {
        Self::all_kinds()
    }
}

impl NamedQueueService for InMemoryEventHandler {
    fn on_event(&self, payload: NamedQueuePayload) {
        let kind = payload.kind();
        if !self.enabled.contains(&kind) {
            return;
        }
        let mut queues = self.queues.lock();
        let queue = queues.entry(kind).or_default();
        queue.push_front(payload);
        queue.truncate(self.queue_capacity);
    }

    fn get_records(&self, request: &NamedQueueGetRequest) -> NamedQueueGetResponse {
        let queues = self.queues.lock();
        let records = queues
            .get(&request.kind)
            .map(|queue| {
                queue
                    .iter()
                    .filter(|record| {
                        request
                            .filter
                            .as_deref()
                            .map_or(true, |needle| record.matches(needle))
                    })
                    .take(request.limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        NamedQueueGetResponse {
            kind: request.kind,
            records,
        }
    }

    fn clear(&self, kind: NamedQueueKind) -> bool {
        if !self.enabled.contains(&kind) {
            return false;
        }
        if let Some(queue) = self.queues.lock().get_mut(&kind) {
            queue.clear();
        }
        debug!(kind = kind.as_str(), "cleared named queue");
        true
    }

    fn persist_all(&self, kind: NamedQueueKind) {
        let Some(sink) = &self.sink else {
            return;
        };
        let snapshot: Vec<NamedQueuePayload> = {
            let queues = self.queues.lock();
            queues
                .get(&kind)
                .map(|queue| queue.iter().cloned().collect())
                .unwrap_or_default()
        };
        // Sink runs outside the lock so a slow store never stalls on_event.
        sink.persist(kind, &snapshot);
    }
}
