//! Region Implementation - Unit of Heap Management
//!
//! A region is a fixed-size, contiguous block of the heap arena with its
//! own bump pointer. The barriers only need three facts about a region:
//! whether it is in the collection set (its objects may be evacuated),
//! whether it is dirty (re-barriered slots were written into it), and how
//! far it has been allocated (its parsable extent).
//!
//! Region Lifecycle:
//! ```text
//! Free ──▶ Mutator ──(collection set)──▶ evacuated
//!   │
//!   └────▶ ToSpace (evacuation copies)
//! ```
//!
//! # Memory Ordering Model
//!
//! ## Bump pointer (`top`)
//! - **Allocation:** CAS with `AcqRel`, so a thread that observes a new top
//!   also observes the region's claim.
//! - **Parsing:** `Acquire` load before walking objects.
//!
//! ## Kind
//! - **Claim:** CAS `Free -> kind` with `AcqRel`; exactly one thread wins.
//!
//! ## Collection set / dirty flags
//! - **Store:** `Release`, **Load:** `Acquire`.

use crate::heap::MemRegion;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// What a region is currently used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegionKind {
    /// Unused, can be claimed by either allocator
    Free = 0,
    /// Holds objects allocated by mutators
    Mutator = 1,
    /// Holds evacuated copies
    ToSpace = 2,
}

impl RegionKind {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RegionKind::Mutator,
            2 => RegionKind::ToSpace,
            _ => RegionKind::Free,
        }
    }
}

/// HeapRegion - one fixed-size slice of the heap
pub struct HeapRegion {
    index: usize,
    bottom: usize,
    end: usize,
    top: AtomicUsize,
    kind: AtomicU8,
    in_cset: AtomicBool,
    dirty: AtomicBool,
}

impl HeapRegion {
    pub(crate) fn new(index: usize, bottom: usize, size: usize) -> Self {
        Self {
            index,
            bottom,
            end: bottom + size,
            top: AtomicUsize::new(bottom),
            kind: AtomicU8::new(RegionKind::Free as u8),
            in_cset: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn bottom(&self) -> usize {
        self.bottom
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Current allocation top
    #[inline]
    pub fn top(&self) -> usize {
        self.top.load(Ordering::Acquire)
    }

    /// Allocated part of the region
    pub fn used_region(&self) -> MemRegion {
        MemRegion::from_bounds(self.bottom, self.top())
    }

    /// Bytes still available for allocation
    pub fn free_bytes(&self) -> usize {
        self.end - self.top()
    }

    #[inline]
    pub fn kind(&self) -> RegionKind {
        RegionKind::from_u8(self.kind.load(Ordering::Acquire))
    }

    /// Claim a free region for `kind`
    ///
    /// Returns false if another thread claimed it first.
    pub(crate) fn try_claim(&self, kind: RegionKind) -> bool {
        self.kind
            .compare_exchange(
                RegionKind::Free as u8,
                kind as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Give back a region claimed but never allocated into
    pub(crate) fn unclaim(&self) {
        debug_assert_eq!(self.top(), self.bottom, "unclaiming a used region");
        self.kind.store(RegionKind::Free as u8, Ordering::Release);
    }

    /// Bump-allocate `bytes`, lock-free
    pub(crate) fn try_allocate(&self, bytes: usize) -> Option<usize> {
        let mut top = self.top.load(Ordering::Relaxed);
        loop {
            let new_top = top.checked_add(bytes)?;
            if new_top > self.end {
                return None;
            }
            match self
                .top
                .compare_exchange_weak(top, new_top, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Some(top),
                Err(current) => top = current,
            }
        }
    }

    /// Retract the most recent allocation if nothing was allocated after it
    pub(crate) fn undo_allocation(&self, address: usize, bytes: usize) -> bool {
        self.top
            .compare_exchange(address + bytes, address, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    // === Collection Set ===

    #[inline]
    pub fn in_collection_set(&self) -> bool {
        self.in_cset.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_collection_set(&self, value: bool) {
        self.in_cset.store(value, Ordering::Release);
    }

    // === Dirty Tracking ===

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mark_dirty(&self) {
        // Skip the store when already dirty to keep the line shared.
        if !self.dirty.load(Ordering::Relaxed) {
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// Clear the dirty flag, returning whether it was set
    pub fn clear_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for HeapRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapRegion")
            .field("index", &self.index)
            .field("bottom", &format_args!("{:#x}", self.bottom))
            .field("top", &format_args!("{:#x}", self.top()))
            .field("kind", &self.kind())
            .field("in_cset", &self.in_collection_set())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
