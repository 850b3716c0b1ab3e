//! SATB Buffers - Thread-owned logs of overwritten references
//!
//! Snapshot-at-the-beginning marking requires that every reference
//! overwritten during a marking cycle is remembered before the store
//! happens. Mutators append the old value to a small buffer they own; a
//! full buffer is handed off whole to the shared
//! [`PendingLogSet`](super::queue_set::PendingLogSet) and the thread picks
//! up a fresh one on its next enqueue.
//!
//! Buffer Lifecycle:
//! ```text
//!   BufferAllocator ──allocate──▶ SatbQueue (owning thread)
//!         ▲                           │ full / flush
//!         │ release                   ▼
//!   marking worker ◀──take────── PendingLogSet
//! ```
//!
//! Buffers only ever move as `Box<SatbBuffer>`, so the owning thread
//! cannot touch a buffer after handing it off.

use crate::object::ObjectReference;
use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-capacity buffer of logged references
///
/// Storage is reserved up front; pushing never reallocates. Each buffer
/// is stamped with the queue-set generation it was handed out in, so
/// entries logged for an abandoned marking cycle can be recognized
/// wherever the buffer ends up.
pub struct SatbBuffer {
    entries: Vec<ObjectReference>,
    capacity: usize,
    generation: u64,
}

impl SatbBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            generation: 0,
        }
    }

    /// Queue-set generation the entries were logged in
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append `obj`, returning true if the buffer is now full
    #[inline]
    pub fn push(&mut self, obj: ObjectReference) -> bool {
        crate::barrier_guarantee!(
            self.entries.len() < self.capacity,
            "push into a full SATB buffer ({} entries)",
            self.capacity
        );
        self.entries.push(obj);
        self.entries.len() >= self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Logged references, oldest first
    pub fn entries(&self) -> &[ObjectReference] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for SatbBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatbBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Free list of recycled buffers
///
/// Lock-free on both ends; a fresh buffer is only allocated when the
/// free list is empty.
pub struct BufferAllocator {
    capacity: usize,
    free: SegQueue<Box<SatbBuffer>>,
    allocated: AtomicUsize,
}

impl BufferAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: SegQueue::new(),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Capacity of every buffer handed out
    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    /// Get an empty buffer stamped with `generation`
    pub fn allocate(&self, generation: u64) -> Box<SatbBuffer> {
        let mut buffer = match self.free.pop() {
            Some(buffer) => buffer,
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Box::new(SatbBuffer::with_capacity(self.capacity))
            }
        };
        buffer.generation = generation;
        buffer
    }

    /// Return a buffer to the free list
    pub fn release(&self, mut buffer: Box<SatbBuffer>) {
        buffer.clear();
        self.free.push(buffer);
    }

    /// Buffers currently on the free list
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Buffers ever created
    pub fn allocated_count(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

/// Per-thread SATB queue
///
/// Owned by exactly one mutator thread and only ever passed by `&mut`.
/// Holds the current buffer, if any, and the queue-set generation that
/// buffer belongs to; a buffer from an abandoned marking cycle is
/// discarded on the next access.
#[derive(Debug, Default)]
pub struct SatbQueue {
    pub(crate) buffer: Option<Box<SatbBuffer>>,
    pub(crate) generation: u64,
}

impl SatbQueue {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            buffer: None,
            generation,
        }
    }

    /// Entries logged in the current buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Does the thread currently own a buffer
    #[inline]
    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Entries in the current buffer, oldest first
    pub fn entries(&self) -> &[ObjectReference] {
        self.buffer.as_ref().map_or(&[], |b| b.entries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(raw: usize) -> ObjectReference {
        ObjectReference::from_raw(raw).unwrap()
    }

    #[test]
    fn test_push_reports_full() {
        let mut buffer = SatbBuffer::with_capacity(2);
        assert!(!buffer.push(obj(0x1000)));
        assert!(buffer.push(obj(0x1008)));
        assert!(buffer.is_full());
        assert_eq!(buffer.entries(), &[obj(0x1000), obj(0x1008)]);
    }

    #[test]
    fn test_push_never_reallocates() {
        let mut buffer = SatbBuffer::with_capacity(64);
        let before = buffer.entries.as_ptr();
        for i in 0..64 {
            buffer.push(obj(0x1000 + i * 8));
        }
        assert_eq!(before, buffer.entries.as_ptr());
    }

    #[test]
    fn test_allocator_recycles() {
        let allocator = BufferAllocator::new(4);
        let mut buffer = allocator.allocate(0);
        buffer.push(obj(0x1000));
        allocator.release(buffer);

        assert_eq!(allocator.free_count(), 1);
        let again = allocator.allocate(3);
        assert!(again.is_empty());
        assert_eq!(again.capacity(), 4);
        assert_eq!(again.generation(), 3);
        assert_eq!(allocator.allocated_count(), 1);
    }
}
