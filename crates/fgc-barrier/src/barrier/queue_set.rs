//! SATB Queue Set - Shared side of SATB logging
//!
//! The queue set owns everything about SATB logging that is not
//! thread-local: the active flag toggled at marking start and end, the
//! buffer free list, and the [`PendingLogSet`] of full buffers waiting
//! for a marking worker.
//!
//! # Memory Ordering Model
//!
//! ## Active flag
//! - **Store:** `Release` by the collector at phase change
//! - **Load:** `Acquire` by mutators before logging
//!
//! ## Generation
//! - **Bump:** `AcqRel` when partial marking is abandoned
//! - **Load:** `Acquire` on every enqueue; a thread holding a buffer from
//!   an older generation drops its contents
//!
//! ## Pending buffers
//! - `SegQueue` push/pop; pushing a buffer publishes its entries to the
//!   thread that pops it.
//! - A mutator can pass every check and still hand off a buffer after
//!   abandon has drained the set. Buffers carry their generation, and
//!   consumers recycle any buffer from an older one unread.

use super::satb::{BufferAllocator, SatbBuffer, SatbQueue};
use crate::object::ObjectReference;
use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Result of a single enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Entry stored in the thread's buffer
    Buffered,
    /// Entry stored and the full buffer handed off
    HandedOff,
}

/// Global set of full SATB buffers awaiting marking
///
/// Append and removal are lock-free. Counts are maintained next to the
/// queue and may briefly lag it under concurrent use.
#[derive(Default)]
pub struct PendingLogSet {
    buffers: SegQueue<Box<SatbBuffer>>,
    count: AtomicUsize,
    entries: AtomicUsize,
}

impl PendingLogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand off a retired buffer
    pub fn push(&self, buffer: Box<SatbBuffer>) {
        self.entries.fetch_add(buffer.len(), Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
        self.buffers.push(buffer);
    }

    /// Take one retired buffer
    pub fn pop(&self) -> Option<Box<SatbBuffer>> {
        let buffer = self.buffers.pop()?;
        self.count.fetch_sub(1, Ordering::AcqRel);
        self.entries.fetch_sub(buffer.len(), Ordering::Relaxed);
        Some(buffer)
    }

    /// Buffers pending
    #[inline]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logged references across all pending buffers
    pub fn entry_count(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for PendingLogSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogSet")
            .field("buffers", &self.len())
            .field("entries", &self.entry_count())
            .finish()
    }
}

/// Shared SATB state for all mutator threads
pub struct SatbQueueSet {
    allocator: BufferAllocator,
    pending: PendingLogSet,
    active: AtomicBool,
    generation: AtomicU64,
}

impl SatbQueueSet {
    /// Queue set handing out buffers of `buffer_capacity` entries
    pub fn new(buffer_capacity: usize) -> Self {
        crate::barrier_guarantee!(buffer_capacity > 0, "SATB buffer capacity must be > 0");
        Self {
            allocator: BufferAllocator::new(buffer_capacity),
            pending: PendingLogSet::new(),
            active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// A queue for a newly attached thread
    pub fn new_queue(&self) -> SatbQueue {
        SatbQueue::new(self.generation.load(Ordering::Acquire))
    }

    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.allocator.buffer_capacity()
    }

    #[inline]
    pub fn allocator(&self) -> &BufferAllocator {
        &self.allocator
    }

    #[inline]
    pub fn pending(&self) -> &PendingLogSet {
        &self.pending
    }

    /// Is SATB logging on
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Turn SATB logging on or off for every thread
    ///
    /// `expected` is the state the caller believes the set is in.
    pub fn set_active_all_threads(&self, active: bool, expected: bool) {
        let previous = self.active.swap(active, Ordering::AcqRel);
        crate::barrier_guarantee!(
            previous == expected,
            "SATB queue set active was {}, expected {}",
            previous,
            expected
        );
        log::trace!("SATB logging {}", if active { "activated" } else { "deactivated" });
    }

    /// Current marking generation, bumped by every abandon
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[inline]
    fn is_stale(&self, buffer: &SatbBuffer) -> bool {
        buffer.generation() != self.generation()
    }

    /// Generation to log under, or `None` if logging is off
    ///
    /// The generation is read before the active flag. Abandon clears the
    /// flag before bumping, so a caller that sees the flag set holds a
    /// generation no newer than the one a concurrent abandon retires.
    #[inline]
    pub fn active_generation(&self) -> Option<u64> {
        let generation = self.generation();
        self.is_active().then_some(generation)
    }

    #[inline]
    fn sync_generation(&self, queue: &mut SatbQueue, current: u64) {
        if queue.generation != current {
            if let Some(stale) = queue.buffer.take() {
                self.allocator.release(stale);
            }
            queue.generation = current;
        }
    }

    /// Log `obj` in the thread's buffer, handing the buffer off when full
    #[inline]
    pub fn enqueue(&self, queue: &mut SatbQueue, obj: ObjectReference) -> EnqueueOutcome {
        self.enqueue_at(queue, self.generation(), obj)
    }

    /// [`enqueue`](Self::enqueue) under a generation taken from
    /// [`active_generation`](Self::active_generation)
    #[inline]
    pub fn enqueue_at(
        &self,
        queue: &mut SatbQueue,
        generation: u64,
        obj: ObjectReference,
    ) -> EnqueueOutcome {
        self.sync_generation(queue, generation);
        let buffer = queue
            .buffer
            .get_or_insert_with(|| self.allocator.allocate(generation));
        if buffer.push(obj) {
            if let Some(full) = queue.buffer.take() {
                self.enqueue_completed(full);
            }
            EnqueueOutcome::HandedOff
        } else {
            EnqueueOutcome::Buffered
        }
    }

    /// Publish a retired buffer
    ///
    /// Empty buffers and buffers of an abandoned generation go back to
    /// the free list.
    pub fn enqueue_completed(&self, buffer: Box<SatbBuffer>) {
        if buffer.is_empty() || self.is_stale(&buffer) {
            self.allocator.release(buffer);
        } else {
            self.pending.push(buffer);
        }
    }

    /// Hand off whatever the thread has logged so far
    ///
    /// Returns the number of entries published.
    pub fn flush(&self, queue: &mut SatbQueue) -> usize {
        self.sync_generation(queue, self.generation());
        match queue.buffer.take() {
            Some(buffer) => {
                let len = buffer.len();
                self.enqueue_completed(buffer);
                len
            }
            None => 0,
        }
    }

    /// Drop every pending buffer after marking was aborted
    ///
    /// Buffers still held by threads are discarded on their next enqueue
    /// or flush.
    pub fn abandon_partial_marking(&self) -> usize {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut dropped = 0;
        while let Some(buffer) = self.pending.pop() {
            dropped += buffer.len();
            self.allocator.release(buffer);
        }
        log::debug!(
            "abandoned partial marking: {} pending entries dropped, generation {}",
            dropped,
            generation
        );
        dropped
    }

    // === Consumer Side ===

    /// Take one completed buffer; return it with [`recycle`](Self::recycle)
    ///
    /// Buffers handed off after their generation was abandoned are
    /// recycled here without being returned.
    pub fn take_completed(&self) -> Option<Box<SatbBuffer>> {
        loop {
            let buffer = self.pending.pop()?;
            if !self.is_stale(&buffer) {
                return Some(buffer);
            }
            log::trace!(
                "dropping {} SATB entries of abandoned generation {}",
                buffer.len(),
                buffer.generation()
            );
            self.allocator.release(buffer);
        }
    }

    /// Return a consumed buffer to the free list
    pub fn recycle(&self, buffer: Box<SatbBuffer>) {
        self.allocator.release(buffer);
    }

    /// Apply `f` to every entry of one completed buffer
    ///
    /// Returns false if no buffer was pending.
    pub fn apply_closure_to_completed_buffer<F>(&self, mut f: F) -> bool
    where
        F: FnMut(ObjectReference),
    {
        match self.take_completed() {
            Some(buffer) => {
                buffer.entries().iter().copied().for_each(&mut f);
                self.allocator.release(buffer);
                true
            }
            None => false,
        }
    }

    /// Remove and return every pending entry
    pub fn drain_completed(&self) -> Vec<ObjectReference> {
        let mut drained = Vec::with_capacity(self.pending.entry_count());
        while self.apply_closure_to_completed_buffer(|obj| drained.push(obj)) {}
        drained
    }

    /// Number of completed buffers waiting
    #[inline]
    pub fn completed_buffers_num(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for SatbQueueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatbQueueSet")
            .field("active", &self.is_active())
            .field("capacity", &self.buffer_capacity())
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(i: usize) -> ObjectReference {
        ObjectReference::from_raw(0x10_0000 + i * 8).unwrap()
    }

    #[test]
    fn test_full_buffer_is_handed_off_whole() {
        let set = SatbQueueSet::new(4);
        let mut queue = set.new_queue();

        for i in 0..3 {
            assert_eq!(set.enqueue(&mut queue, obj(i)), EnqueueOutcome::Buffered);
        }
        assert_eq!(set.enqueue(&mut queue, obj(3)), EnqueueOutcome::HandedOff);

        assert!(!queue.has_buffer());
        assert_eq!(set.completed_buffers_num(), 1);
        assert_eq!(set.pending().entry_count(), 4);
        assert_eq!(set.drain_completed(), (0..4).map(obj).collect::<Vec<_>>());
    }

    #[test]
    fn test_fresh_buffer_after_hand_off() {
        let set = SatbQueueSet::new(2);
        let mut queue = set.new_queue();

        set.enqueue(&mut queue, obj(0));
        set.enqueue(&mut queue, obj(1));
        set.enqueue(&mut queue, obj(2));

        assert_eq!(queue.entries(), &[obj(2)]);
        assert_eq!(set.completed_buffers_num(), 1);
    }

    #[test]
    fn test_flush_publishes_partial_and_recycles_empty() {
        let set = SatbQueueSet::new(8);
        let mut queue = set.new_queue();

        assert_eq!(set.flush(&mut queue), 0);
        set.enqueue(&mut queue, obj(0));
        assert_eq!(set.flush(&mut queue), 1);
        assert_eq!(set.completed_buffers_num(), 1);

        let mut empty = set.new_queue();
        empty.buffer = Some(set.allocator().allocate(set.generation()));
        set.flush(&mut empty);
        assert_eq!(set.completed_buffers_num(), 1);
        assert_eq!(set.allocator().free_count(), 1);
    }

    #[test]
    fn test_abandon_discards_pending_and_stale_local() {
        let set = SatbQueueSet::new(2);
        let mut queue = set.new_queue();
        set.enqueue(&mut queue, obj(0));
        set.enqueue(&mut queue, obj(1));
        set.enqueue(&mut queue, obj(2));

        assert_eq!(set.abandon_partial_marking(), 2);
        assert!(set.pending().is_empty());

        // The stale local entry is dropped before the new one is logged.
        set.enqueue(&mut queue, obj(3));
        assert_eq!(queue.entries(), &[obj(3)]);
    }

    #[test]
    fn test_late_hand_off_after_abandon_is_dropped() {
        let set = SatbQueueSet::new(4);
        let mut late = set.allocator().allocate(set.generation());
        late.push(obj(0));
        late.push(obj(1));

        set.abandon_partial_marking();
        // A mutator that passed its checks before the abandon hands off now.
        set.pending().push(late);

        assert!(set.take_completed().is_none());
        assert!(set.drain_completed().is_empty());
        assert!(set.pending().is_empty());
        assert_eq!(set.allocator().free_count(), 1);
    }

    #[test]
    fn test_stale_buffer_not_published() {
        let set = SatbQueueSet::new(4);
        let mut stale = set.allocator().allocate(set.generation());
        stale.push(obj(0));
        set.abandon_partial_marking();

        set.enqueue_completed(stale);
        assert!(set.pending().is_empty());
    }

    #[test]
    fn test_enqueue_under_generation_read_before_abandon() {
        let set = SatbQueueSet::new(1);
        let mut queue = set.new_queue();
        set.set_active_all_threads(true, false);
        let generation = set.active_generation().unwrap();

        set.set_active_all_threads(false, true);
        set.abandon_partial_marking();
        assert!(set.active_generation().is_none());

        // The mutator saw marking on and logs after the abandon finished.
        assert_eq!(
            set.enqueue_at(&mut queue, generation, obj(0)),
            EnqueueOutcome::HandedOff
        );
        assert!(set.pending().is_empty());
        assert!(set.drain_completed().is_empty());
    }

    #[test]
    fn test_active_toggle() {
        let set = SatbQueueSet::new(2);
        assert!(!set.is_active());
        set.set_active_all_threads(true, false);
        assert!(set.is_active());
        set.set_active_all_threads(false, true);
        assert!(!set.is_active());
    }

    #[test]
    #[should_panic(expected = "barrier precondition violated")]
    fn test_active_toggle_checks_expected_state() {
        let set = SatbQueueSet::new(2);
        set.set_active_all_threads(false, true);
    }

    #[test]
    fn test_apply_closure_consumes_one_buffer() {
        let set = SatbQueueSet::new(1);
        let mut queue = set.new_queue();
        set.enqueue(&mut queue, obj(0));
        set.enqueue(&mut queue, obj(1));

        let mut seen = Vec::new();
        assert!(set.apply_closure_to_completed_buffer(|o| seen.push(o)));
        assert_eq!(seen, vec![obj(0)]);
        assert_eq!(set.completed_buffers_num(), 1);
    }
}
