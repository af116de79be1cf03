//! Bounded MPSC ring buffer with a claim/publish protocol.
//!
//! Many producers hand events to one consumer with strict sequence order and
//! no loss. Producers reserve a sequence with a CAS on the claim cursor,
//! write the slot at `sequence & mask`, then publish with a release store
//! into a per-slot availability array. The consumer owns its cursor and only
//! reads a sequence once its slot shows exactly that sequence as published.
//!
//! ## Backpressure
//!
//! A producer may not claim sequence `S` until the consumer has finished
//! `S - capacity`; `claim` parks the caller (spin, then condvar) instead of
//! dropping or growing. This wraparound blocking is also what makes per-slot
//! locking unnecessary: a slot is never written again until its previous
//! occupant has been consumed.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{NamedQueueError, Result};
use crate::ring::slot::RecordEnvelope;
use crate::ring::wait_strategy::BlockingWaitStrategy;

/// Sequence number type for ring buffer positions
pub type Sequence = u64;

/// Sentinel meaning "no sequence has ever been published at this index"
const UNPUBLISHED: u64 = u64::MAX;

pub struct RingBuffer<T> {
    buffer: Box<[UnsafeCell<RecordEnvelope<T>>]>,
    /// Per-slot availability: the highest sequence published at this index.
    /// Stale values from earlier wraparound rounds never equal the sequence
    /// the consumer is waiting for, so no flag clearing is needed on reuse.
    published: Box<[AtomicU64]>,
    mask: usize,
    claim_cursor: AtomicU64,
    /// Next sequence the consumer has yet to consume; written only by the
    /// consumer thread
    consumer_cursor: AtomicU64,
    shutdown: AtomicBool,
    not_full: BlockingWaitStrategy,
    not_empty: BlockingWaitStrategy,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(NamedQueueError::config(
                "ring buffer capacity must be a power of 2",
            ));
        }

        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(RecordEnvelope::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let published = (0..capacity)
            .map(|_| AtomicU64::new(UNPUBLISHED))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            buffer,
            published,
            mask: capacity - 1,
            claim_cursor: AtomicU64::new(0),
            consumer_cursor: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            not_full: BlockingWaitStrategy::new(),
            not_empty: BlockingWaitStrategy::new(),
        })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Highest claimed sequence bound; sequences below this are claimed
    /// (though not necessarily published yet)
    #[inline]
    pub fn claimed(&self) -> Sequence {
        self.claim_cursor.load(Ordering::Acquire)
    }

    #[inline(always)]
    fn has_space(&self, next: Sequence, consumer_seq: Sequence) -> bool {
        next - consumer_seq <= self.buffer.len() as u64
    }

    /// Atomically reserve the next sequence, parking while the destination
    /// slot is still occupied by an unconsumed previous round.
    ///
    /// Returns `Closed` once `shutdown` has unparked the caller; a claim that
    /// already succeeded before shutdown is unaffected.
    pub fn claim(&self) -> Result<Sequence> {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(NamedQueueError::Closed);
            }

            let current = self.claim_cursor.load(Ordering::Relaxed);
            let next = current + 1;
            let consumer_seq = self.consumer_cursor.load(Ordering::Acquire);

            if !self.has_space(next, consumer_seq) {
                // Ring full: park until the consumer frees the slot or the
                // ring shuts down, then re-run the whole claim.
                self.not_full.wait_until(|| {
                    self.shutdown.load(Ordering::Acquire)
                        || self.has_space(next, self.consumer_cursor.load(Ordering::Acquire))
                });
                continue;
            }

            match self.claim_cursor.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(current),
                Err(_) => std::hint::spin_loop(),
            }
        }
    }

    /// Mutable handle to the slot for a claimed sequence.
    ///
    /// # Safety
    /// Caller must hold the claim for `sequence` and not have published it
    /// yet; the claim/publish protocol guarantees no other thread touches
    /// this slot in that window.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot_at(&self, sequence: Sequence) -> &mut RecordEnvelope<T> {
        let idx = (sequence as usize) & self.mask;
        &mut *self.buffer[idx].get()
    }

    /// Make a written slot visible to the consumer. Must be called exactly
    /// once per claim, write-before-publish; see [`PublishGuard`].
    pub fn publish(&self, sequence: Sequence) {
        let idx = (sequence as usize) & self.mask;
        self.published[idx].store(sequence, Ordering::Release);
        self.not_empty.signal_all();
    }

    /// Whether `sequence` has been published in the current round
    #[inline]
    pub fn is_published(&self, sequence: Sequence) -> bool {
        let idx = (sequence as usize) & self.mask;
        self.published[idx].load(Ordering::Acquire) == sequence
    }

    /// Park the consumer until `sequence` is published or `interrupt`
    /// returns true
    pub fn wait_for_publish<F: Fn() -> bool>(&self, sequence: Sequence, interrupt: F) {
        self.not_empty
            .wait_until(|| self.is_published(sequence) || interrupt());
    }

    /// Move the payload out of a published slot.
    ///
    /// # Safety
    /// Consumer-only, and `sequence` must be published and not yet consumed.
    /// The single-consumer discipline means no other thread reads this slot.
    pub unsafe fn take(&self, sequence: Sequence) -> Option<T> {
        let idx = (sequence as usize) & self.mask;
        (*self.buffer[idx].get()).take()
    }

    /// Advance the consumer cursor past everything below `sequence` and
    /// unpark producers waiting for the freed slots. Consumer-only.
    pub fn advance_consumer(&self, sequence: Sequence) {
        self.consumer_cursor.store(sequence, Ordering::Release);
        self.not_full.signal_all();
    }

    /// Wake the consumer if it is parked waiting for a publish; used by the
    /// shutdown path to get phase changes noticed promptly
    pub fn signal_consumer(&self) {
        self.not_empty.signal_all();
    }

    /// Unpark every blocked producer and fail their pending claims.
    /// Called once the dispatcher has halted; later claims return `Closed`.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.not_full.signal_all();
        self.not_empty.signal_all();
    }
}

// SAFETY: slots are accessed through the claim/publish protocol only; a slot
// is written by exactly one producer between claim and publish, and read by
// the single consumer only after the release store in `publish`.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

/// Scoped publish: guarantees `publish` runs exactly once for a claimed
/// sequence even if the producer's write panics. Without this the consumer
/// would stall forever waiting on the unpublished sequence.
pub struct PublishGuard<'a, T> {
    ring: &'a RingBuffer<T>,
    sequence: Sequence,
}

impl<'a, T> PublishGuard<'a, T> {
    pub fn new(ring: &'a RingBuffer<T>, sequence: Sequence) -> Self {
        Self { ring, sequence }
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }
}

impl<T> Drop for PublishGuard<'_, T> {
    fn drop(&mut self) {
        self.ring.publish(self.sequence);
    }
}
