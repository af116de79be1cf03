//! Reusable slot cell for the ring buffer.

/// A reusable cell holding one event payload.
///
/// Identity is stable for the lifetime of the ring; content is replaced on
/// every wraparound cycle via [`load`](Self::load) and moved out exactly once
/// per cycle via [`take`](Self::take).
#[derive(Debug)]
pub struct RecordEnvelope<T> {
    record: Option<T>,
}

impl<T> Default for RecordEnvelope<T> {
    fn default() -> Self {
        Self { record: None }
    }
}

impl<T> RecordEnvelope<T> {
    /// Replace the slot content with a new record
    #[inline]
    pub fn load(&mut self, record: T) {
        self.record = Some(record);
    }

    /// Move the record out, leaving the slot empty for the next cycle.
    ///
    /// Returns `None` if the producer published without loading, which the
    /// consumer treats as a skipped sequence.
    #[inline]
    pub fn take(&mut self) -> Option<T> {
        self.record.take()
    }
}
