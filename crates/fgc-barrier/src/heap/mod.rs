//! Heap Module - The managed address range the barriers operate on
//!
//! The barrier layer does not manage the heap; it only needs to ask
//! questions about it (is this an object, which region is it in, is that
//! region being evacuated) and to read and heal reference slots. This
//! module provides exactly that over a simple region heap:
//!
//! ```text
//! ┌──────────────────── anonymous mapping (memmap2) ────────────────────┐
//! │ region 0 │ region 1 │ region 2 │   ...                 │ region N-1 │
//! │ Mutator  │ ToSpace  │ Free     │                       │ Free       │
//! └──────────┴──────────┴──────────┴───────────────────────┴────────────┘
//! ```
//!
//! Allocation is a lock-free bump inside the current region of each kind;
//! a full region is replaced by claiming the next free one. There is no
//! reclamation: deciding what to free is the collector's business.
//!
//! Reference slots are 8 bytes wide, or 4 bytes when the heap uses
//! compressed references ([`SlotWidth`]).

pub mod mem_region;
pub mod region;

pub use mem_region::MemRegion;
pub use region::{HeapRegion, RegionKind};

use crate::config::BarrierConfig;
use crate::error::{BarrierError, Result};
use crate::object::{
    CompressedOops, ForwardingState, NarrowOop, ObjectHeader, ObjectReference, HEADER_SIZE,
    HEADER_WORDS,
};
use crate::util::constants::WORD_SIZE;
use crate::util::Alignment;
use memmap2::MmapMut;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

const NO_REGION: usize = usize::MAX;

/// Width of a reference slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWidth {
    /// Full-width, pointer-sized slot
    Oop,
    /// 32-bit compressed slot
    Narrow,
}

impl SlotWidth {
    /// Slot size in bytes
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            SlotWidth::Oop => WORD_SIZE,
            SlotWidth::Narrow => std::mem::size_of::<u32>(),
        }
    }
}

/// Heap - region-partitioned arena of objects
pub struct Heap {
    mapping: MmapMut,
    reserved: MemRegion,
    region_size: usize,
    log_region_size: u32,
    regions: Box<[HeapRegion]>,
    mutator_region: AtomicUsize,
    to_space_region: AtomicUsize,
    codec: Option<CompressedOops>,
}

impl Heap {
    /// Reserve and partition the heap described by `config`
    pub fn new(config: &BarrierConfig) -> Result<Self> {
        config.validate()?;

        let region_size = Alignment::align_to_page(config.region_size);
        let region_count = config.region_count();
        let size = region_count * region_size;

        let mut mapping = MmapMut::map_anon(size).map_err(|e| {
            BarrierError::HeapReservation(format!("cannot map {} bytes: {}", size, e))
        })?;
        let base = mapping.as_mut_ptr() as usize;

        let regions: Box<[HeapRegion]> = (0..region_count)
            .map(|index| HeapRegion::new(index, base + index * region_size, region_size))
            .collect();

        let codec = config
            .compressed_refs
            .then(|| CompressedOops::new(base, base + size));

        log::debug!(
            "heap reserved at {:#x}: {} regions of {} bytes, compressed refs: {}",
            base,
            region_count,
            region_size,
            codec.is_some()
        );

        Ok(Self {
            mapping,
            reserved: MemRegion::new(base, size / WORD_SIZE),
            region_size,
            log_region_size: region_size.trailing_zeros(),
            regions,
            mutator_region: AtomicUsize::new(NO_REGION),
            to_space_region: AtomicUsize::new(NO_REGION),
            codec,
        })
    }

    // === Geometry ===

    /// The whole reserved range
    #[inline]
    pub fn reserved(&self) -> MemRegion {
        self.reserved
    }

    /// Is `address` inside the heap
    #[inline]
    pub fn contains(&self, address: usize) -> bool {
        self.reserved.contains(address)
    }

    #[inline]
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    pub fn regions(&self) -> &[HeapRegion] {
        &self.regions
    }

    /// Region holding `address`
    #[inline]
    pub fn region_containing(&self, address: usize) -> Option<&HeapRegion> {
        if !self.contains(address) {
            return None;
        }
        let index = (address - self.reserved.start()) >> self.log_region_size;
        self.regions.get(index)
    }

    /// Bytes still allocatable in free and partially used regions
    pub fn free_bytes(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| r.kind() != RegionKind::ToSpace)
            .map(HeapRegion::free_bytes)
            .sum()
    }

    /// Size of the backing mapping in bytes
    pub fn mapped_bytes(&self) -> usize {
        self.mapping.len()
    }

    // === Reference Encoding ===

    /// Are reference slots narrow
    #[inline]
    pub fn uses_compressed_refs(&self) -> bool {
        self.codec.is_some()
    }

    #[inline]
    pub fn slot_width(&self) -> SlotWidth {
        if self.codec.is_some() {
            SlotWidth::Narrow
        } else {
            SlotWidth::Oop
        }
    }

    /// Narrow codec, when the heap is compressed
    #[inline]
    pub fn compressed_oops(&self) -> Option<&CompressedOops> {
        self.codec.as_ref()
    }

    /// Encode a reference for this heap's narrow slots
    ///
    /// # Panics
    /// In diagnostic builds, if the heap does not use compressed references.
    pub fn encode(&self, reference: Option<ObjectReference>) -> NarrowOop {
        match self.codec {
            Some(codec) => codec.encode(reference),
            None => {
                crate::barrier_guarantee!(false, "narrow encoding on an uncompressed heap");
                NarrowOop::NULL
            }
        }
    }

    /// Decode a narrow reference of this heap
    pub fn decode(&self, narrow: NarrowOop) -> Option<ObjectReference> {
        match self.codec {
            Some(codec) => codec.decode(narrow),
            None => {
                crate::barrier_guarantee!(false, "narrow decoding on an uncompressed heap");
                None
            }
        }
    }

    // === Allocation ===

    /// Allocate an object of `size_words` words with `ref_slots` reference slots
    ///
    /// The object is zeroed: every reference slot starts out null.
    pub fn allocate(&self, size_words: usize, ref_slots: usize) -> Result<ObjectReference> {
        crate::ensure!(
            size_words >= HEADER_WORDS,
            BarrierError::InvalidArgument(format!(
                "object of {} words cannot hold its header",
                size_words
            ))
        );
        crate::ensure!(
            size_words <= u32::MAX as usize && ref_slots <= u32::MAX as usize,
            BarrierError::InvalidArgument(format!("object of {} words too large", size_words))
        );
        let payload = (size_words - HEADER_WORDS) * WORD_SIZE;
        crate::ensure!(
            ref_slots * self.slot_width().bytes() <= payload,
            BarrierError::InvalidArgument(format!(
                "{} reference slots do not fit {} payload bytes",
                ref_slots, payload
            ))
        );

        let bytes = size_words * WORD_SIZE;
        let obj = self
            .allocate_raw(RegionKind::Mutator, bytes)
            .and_then(ObjectReference::from_raw)
            .ok_or_else(|| BarrierError::OutOfMemory {
                requested: bytes,
                available: self.free_bytes(),
            })?;
        let address = obj.to_raw();

        // SAFETY: `address..address + bytes` was just carved out of the
        // mapping by this thread and is not yet reachable by any other.
        unsafe {
            std::ptr::write_bytes(address as *mut u8, 0, bytes);
        }
        self.header(obj).initialize(size_words, ref_slots);

        Ok(obj)
    }

    /// Allocate raw to-space memory for an evacuated copy
    pub(crate) fn allocate_to_space(&self, bytes: usize) -> Option<usize> {
        self.allocate_raw(RegionKind::ToSpace, bytes)
    }

    /// Give back the last to-space allocation after losing a forwarding race
    pub(crate) fn undo_to_space(&self, address: usize, bytes: usize) -> bool {
        self.region_containing(address)
            .is_some_and(|region| region.undo_allocation(address, bytes))
    }

    fn allocate_raw(&self, kind: RegionKind, bytes: usize) -> Option<usize> {
        if bytes == 0 || bytes > self.region_size {
            return None;
        }

        let cursor = match kind {
            RegionKind::ToSpace => &self.to_space_region,
            _ => &self.mutator_region,
        };

        loop {
            let current = cursor.load(Ordering::Acquire);
            if current != NO_REGION {
                if let Some(address) = self.regions[current].try_allocate(bytes) {
                    return Some(address);
                }
            }

            let claimed = self.regions.iter().find(|r| r.try_claim(kind))?;
            if cursor
                .compare_exchange(current, claimed.index(), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Someone else moved the cursor first; use theirs.
                claimed.unclaim();
            }
        }
    }

    // === Collection Set ===

    /// Add the region holding `address` to the collection set
    pub fn add_to_collection_set(&self, address: usize) {
        if let Some(region) = self.region_containing(address) {
            region.set_in_collection_set(true);
        }
    }

    /// Empty the collection set
    pub fn clear_collection_set(&self) {
        for region in self.regions.iter() {
            region.set_in_collection_set(false);
        }
    }

    /// Is `obj` in a region selected for evacuation
    #[inline]
    pub fn in_collection_set(&self, obj: ObjectReference) -> bool {
        self.region_containing(obj.to_raw())
            .is_some_and(HeapRegion::in_collection_set)
    }

    /// Mark every region overlapping `mr` dirty
    pub fn dirty_regions(&self, mr: MemRegion) {
        self.dirty_range(mr.start(), mr.end());
    }

    /// Mark every region overlapping the byte range `[start, end)` dirty
    pub fn dirty_range(&self, start: usize, end: usize) {
        if end <= start {
            return;
        }
        let first = self.region_containing(start);
        let last = self.region_containing(end - 1);
        if let (Some(first), Some(last)) = (first, last) {
            for region in &self.regions[first.index()..=last.index()] {
                region.mark_dirty();
            }
        }
    }

    // === Objects ===

    fn header_at(&self, address: usize) -> &ObjectHeader {
        crate::barrier_guarantee!(
            self.contains(address) && address % ObjectReference::ALIGNMENT == 0,
            "{:#x} is not an aligned heap address",
            address
        );
        // SAFETY: the address is inside the live mapping owned by `self`,
        // word aligned, and headers are only accessed through atomics.
        unsafe { &*(address as *const ObjectHeader) }
    }

    /// Header of a heap object
    #[inline]
    pub fn header(&self, obj: ObjectReference) -> &ObjectHeader {
        self.header_at(obj.to_raw())
    }

    /// Forwarding state of a heap object
    #[inline]
    pub fn forwarding_state(&self, obj: ObjectReference) -> ForwardingState {
        self.header(obj).forwarding_state()
    }

    /// Range covered by an object
    pub fn object_region(&self, obj: ObjectReference) -> MemRegion {
        MemRegion::new(obj.to_raw(), self.header(obj).size_words())
    }

    /// Plausibility check for an object reference
    ///
    /// True if `obj` lies below the top of an allocated region and its
    /// header describes an object that fits there.
    pub fn is_oop(&self, obj: ObjectReference) -> bool {
        let address = obj.to_raw();
        let Some(region) = self.region_containing(address) else {
            return false;
        };
        if !obj.is_aligned() || region.kind() == RegionKind::Free || address >= region.top() {
            return false;
        }

        let header = self.header(obj);
        let size = header.size_bytes();
        size >= HEADER_SIZE
            && address + size <= region.top()
            && HEADER_SIZE + header.ref_slots() * self.slot_width().bytes() <= size
    }

    /// Address of reference slot `index` of `obj`
    #[inline]
    pub fn ref_slot(&self, obj: ObjectReference, index: usize) -> usize {
        crate::barrier_guarantee!(
            index < self.header(obj).ref_slots(),
            "slot {} out of bounds for {:?}",
            index,
            obj
        );
        obj.offset(HEADER_SIZE + index * self.slot_width().bytes())
    }

    /// Range of the reference slots of `obj` as `(first slot, count)`
    #[inline]
    pub fn ref_slots(&self, obj: ObjectReference) -> (usize, usize) {
        (obj.offset(HEADER_SIZE), self.header(obj).ref_slots())
    }

    /// Visit every object starting in `mr`
    ///
    /// `mr.start()` must be the start of an object; the walk is bounded by
    /// the allocated top of each region it crosses.
    pub fn object_iterate<F>(&self, mr: MemRegion, mut visit: F)
    where
        F: FnMut(ObjectReference),
    {
        let mut cursor = mr.start();
        while cursor < mr.end() {
            let Some(region) = self.region_containing(cursor) else {
                return;
            };
            let top = region.top();
            if cursor >= top {
                cursor = region.end();
                continue;
            }

            let Some(obj) = ObjectReference::from_raw(cursor) else {
                return;
            };
            let size = self.header(obj).size_bytes();
            crate::barrier_guarantee!(
                size >= HEADER_SIZE,
                "unparsable object at {:#x} in {:?}",
                cursor,
                mr
            );
            visit(obj);
            cursor += size.max(HEADER_SIZE);
        }
    }

    // === Slots ===

    #[inline]
    fn word_slot(&self, slot: usize) -> &AtomicUsize {
        crate::barrier_guarantee!(
            self.contains(slot) && slot % WORD_SIZE == 0,
            "{:#x} is not an oop slot in the heap",
            slot
        );
        // SAFETY: in-bounds, aligned, and accessed only atomically.
        unsafe { &*(slot as *const AtomicUsize) }
    }

    #[inline]
    fn narrow_slot(&self, slot: usize) -> &AtomicU32 {
        crate::barrier_guarantee!(
            self.contains(slot) && slot % std::mem::size_of::<u32>() == 0,
            "{:#x} is not a narrow slot in the heap",
            slot
        );
        // SAFETY: in-bounds, aligned, and accessed only atomically.
        unsafe { &*(slot as *const AtomicU32) }
    }

    /// Load a slot of the given width
    #[inline]
    pub fn load_ref_as(&self, width: SlotWidth, slot: usize) -> Option<ObjectReference> {
        match width {
            SlotWidth::Oop => ObjectReference::from_raw(self.word_slot(slot).load(Ordering::Acquire)),
            SlotWidth::Narrow => {
                self.decode(NarrowOop::from_raw(self.narrow_slot(slot).load(Ordering::Acquire)))
            }
        }
    }

    /// Load a reference slot
    #[inline]
    pub fn load_ref(&self, slot: usize) -> Option<ObjectReference> {
        self.load_ref_as(self.slot_width(), slot)
    }

    /// Plain reference store, as performed by the mutator after its barrier
    pub fn store_ref(&self, slot: usize, value: Option<ObjectReference>) {
        match self.slot_width() {
            SlotWidth::Oop => self
                .word_slot(slot)
                .store(ObjectReference::raw_or_null(value), Ordering::Release),
            SlotWidth::Narrow => self
                .narrow_slot(slot)
                .store(self.encode(value).raw(), Ordering::Release),
        }
    }

    /// Replace `expected` by `new` in `slot`, failing if the slot changed
    pub fn compare_exchange_ref(
        &self,
        slot: usize,
        expected: ObjectReference,
        new: ObjectReference,
    ) -> bool {
        match self.slot_width() {
            SlotWidth::Oop => self
                .word_slot(slot)
                .compare_exchange(expected.to_raw(), new.to_raw(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
            SlotWidth::Narrow => self
                .narrow_slot(slot)
                .compare_exchange(
                    self.encode(Some(expected)).raw(),
                    self.encode(Some(new)).raw(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok(),
        }
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("reserved", &self.reserved)
            .field("regions", &self.regions.len())
            .field("region_size", &self.region_size)
            .field("compressed", &self.uses_compressed_refs())
            .finish()
    }
}
