//! Evacuation - Copying a collection-set object to to-space
//!
//! Both mutators (from the write barrier) and collector workers may try
//! to evacuate the same object at the same time. Each racer makes its own
//! copy; the forwarding compare-exchange picks exactly one winner:
//!
//! ```text
//! 1. already forwarded?          -> use forwardee
//! 2. allocate to-space           -> none left: Failed
//! 3. copy payload, fresh header
//! 4. CAS forwarding 0 -> copy    -> won: Copied
//!                                -> lost: undo copy, use winner
//! ```
//!
//! The copy is made word by word with relaxed atomics because other
//! threads may still be healing slots of the source object. The
//! forwarding install (`AcqRel`) publishes the finished copy.

use crate::heap::Heap;
use crate::object::{ForwardingState, ObjectReference, HEADER_WORDS};
use crate::util::constants::WORD_SIZE;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Outcome of one evacuation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evacuation {
    /// This call's copy became the authoritative one
    Copied(ObjectReference),
    /// Another thread forwarded the object first
    AlreadyForwarded(ObjectReference),
    /// No to-space memory was left
    Failed,
}

impl Evacuation {
    /// Authoritative copy, if the object is now forwarded
    pub fn target(self) -> Option<ObjectReference> {
        match self {
            Evacuation::Copied(target) | Evacuation::AlreadyForwarded(target) => Some(target),
            Evacuation::Failed => None,
        }
    }
}

/// Evacuator - copies objects and installs forwarding
pub struct Evacuator {
    bytes_copied: AtomicU64,
    objects_copied: AtomicU64,
    races_lost: AtomicU64,
    failures: AtomicUsize,
}

impl Evacuator {
    pub fn new() -> Self {
        Self {
            bytes_copied: AtomicU64::new(0),
            objects_copied: AtomicU64::new(0),
            races_lost: AtomicU64::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Evacuate `obj` unless it is already forwarded
    pub fn evacuate(&self, heap: &Heap, obj: ObjectReference) -> Evacuation {
        let header = heap.header(obj);
        if let ForwardingState::ForwardedTo(target) = header.forwarding_state() {
            return Evacuation::AlreadyForwarded(target);
        }

        let size_words = header.size_words();
        let bytes = size_words * WORD_SIZE;
        let Some(copy) = heap
            .allocate_to_space(bytes)
            .and_then(ObjectReference::from_raw)
        else {
            self.failures.fetch_add(1, Ordering::Relaxed);
            log::trace!("evacuation of {:?} failed: to-space exhausted", obj);
            return Evacuation::Failed;
        };

        // SAFETY: `copy` is a fresh to-space allocation of `bytes` bytes owned
        // by this thread; the source lies in the heap and is `bytes` long.
        // Both are word aligned and only accessed through atomics.
        unsafe {
            copy_payload(obj.to_raw(), copy.to_raw(), size_words);
        }
        heap.header(copy)
            .initialize(size_words, header.ref_slots());

        match header.try_install_forwarding(copy) {
            Ok(()) => {
                self.bytes_copied.fetch_add(bytes as u64, Ordering::Relaxed);
                self.objects_copied.fetch_add(1, Ordering::Relaxed);
                Evacuation::Copied(copy)
            }
            Err(winner) => {
                self.races_lost.fetch_add(1, Ordering::Relaxed);
                // If something was allocated after our copy it stays behind
                // as a parsable dead object.
                heap.undo_to_space(copy.to_raw(), bytes);
                Evacuation::AlreadyForwarded(winner)
            }
        }
    }

    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied.load(Ordering::Relaxed)
    }

    pub fn objects_copied(&self) -> u64 {
        self.objects_copied.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get evacuation statistics
    pub fn stats(&self) -> EvacuationStats {
        EvacuationStats {
            bytes_copied: self.bytes_copied(),
            objects_copied: self.objects_copied(),
            races_lost: self.races_lost.load(Ordering::Relaxed),
            failures: self.failures() as u64,
        }
    }
}

impl Default for Evacuator {
    fn default() -> Self {
        Self::new()
    }
}

/// Evacuation statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct EvacuationStats {
    pub bytes_copied: u64,
    pub objects_copied: u64,
    pub races_lost: u64,
    pub failures: u64,
}

/// Copy everything after the header, one word at a time
///
/// # Safety
/// Both `src` and `dst` must be word-aligned, valid for `size_words`
/// words, and not overlap.
unsafe fn copy_payload(src: usize, dst: usize, size_words: usize) {
    for word in HEADER_WORDS..size_words {
        let from = &*((src + word * WORD_SIZE) as *const AtomicUsize);
        let to = &*((dst + word * WORD_SIZE) as *const AtomicUsize);
        to.store(from.load(Ordering::Relaxed), Ordering::Relaxed);
    }
}
