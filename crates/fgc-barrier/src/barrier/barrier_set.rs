//! Barrier Set - The semantics behind every barrier entry
//!
//! The barrier set ties together the heap, the collector state word, the
//! SATB queue set and the evacuator. Runtime entries are thin: they check
//! their preconditions and call one of the operations here.
//!
//! Barrier Flow:
//! ```text
//! field pre  ──▶ SATB active? ──▶ enqueue(original)
//! array pre  ──▶ SATB active? ──▶ enqueue(each non-null old slot value)
//! array post ─┐
//! clone      ─┴▶ per slot: HAS_FORWARDED? heal slot (CAS to forwardee,
//!                          evacuating first if EVACUATION)
//!                          SATB active?   enqueue(resolved value)
//!               then mark touched regions dirty
//! write      ──▶ forwarded? forwardee : EVACUATION && in cset? evacuate : src
//! ```
//!
//! None of these operations block or take a lock. The only allocation on
//! any of these paths is a fresh SATB buffer after a hand-off, which
//! comes from the free list when one is available.

use super::queue_set::{EnqueueOutcome, SatbQueueSet};
use super::satb::SatbQueue;
use super::state::{GcState, GcStateFlags};
use super::stats::{AtomicBarrierStats, BarrierStats, Counter};
use crate::config::BarrierConfig;
use crate::error::Result;
use crate::heap::{Heap, MemRegion, SlotWidth};
use crate::logging::{log_event, BarrierEvent};
use crate::object::{ForwardingState, NarrowOop, ObjectReference};
use crate::relocate::{self, Evacuation, Evacuator};
use std::sync::atomic::{AtomicU64, Ordering};

/// Flags read once per bulk operation
#[derive(Debug, Clone, Copy)]
struct SlotPolicy {
    heal: bool,
    evacuate: bool,
    /// SATB generation to log under while marking
    enqueue: Option<u64>,
}

impl SlotPolicy {
    fn is_noop(self) -> bool {
        !self.heal && self.enqueue.is_none()
    }
}

/// BarrierSet - shared barrier state for one heap
pub struct BarrierSet {
    heap: Heap,
    state: GcState,
    satb: SatbQueueSet,
    evacuator: Evacuator,
    stats: AtomicBarrierStats,
    cycle: AtomicU64,
}

impl BarrierSet {
    /// Create the barrier set and its heap
    pub fn new(config: &BarrierConfig) -> Result<Self> {
        let heap = Heap::new(config)?;
        Ok(Self {
            heap,
            state: GcState::new(),
            satb: SatbQueueSet::new(config.satb_buffer_size),
            evacuator: Evacuator::new(),
            stats: AtomicBarrierStats::new(config.stats_enabled),
            cycle: AtomicU64::new(0),
        })
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub fn gc_state(&self) -> &GcState {
        &self.state
    }

    #[inline]
    pub fn satb_queue_set(&self) -> &SatbQueueSet {
        &self.satb
    }

    #[inline]
    pub fn evacuator(&self) -> &Evacuator {
        &self.evacuator
    }

    /// Snapshot of the barrier counters
    pub fn stats(&self) -> BarrierStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    // === Collector Phase Transitions ===

    /// Start a marking cycle: switch SATB logging on
    pub fn start_marking(&self) -> u64 {
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        self.satb.set_active_all_threads(true, false);
        self.state.set(GcStateFlags::MARKING, true);
        log_event(BarrierEvent::MarkingStarted { cycle });
        cycle
    }

    /// End the marking cycle; pending buffers stay for the final drain
    pub fn finish_marking(&self) {
        self.state.set(GcStateFlags::MARKING, false);
        self.satb.set_active_all_threads(false, true);
        log_event(BarrierEvent::MarkingFinished {
            cycle: self.cycle.load(Ordering::Relaxed),
            pending_buffers: self.satb.completed_buffers_num(),
        });
    }

    /// Abort the marking cycle and drop everything logged so far
    pub fn abandon_marking(&self) -> usize {
        self.state.set(GcStateFlags::MARKING, false);
        if self.satb.is_active() {
            self.satb.set_active_all_threads(false, true);
        }
        let dropped_entries = self.satb.abandon_partial_marking();
        log_event(BarrierEvent::MarkingAbandoned {
            cycle: self.cycle.load(Ordering::Relaxed),
            dropped_entries,
        });
        dropped_entries
    }

    /// Start evacuating the current collection set
    pub fn start_evacuation(&self) {
        let cset_regions = self
            .heap
            .regions()
            .iter()
            .filter(|r| r.in_collection_set())
            .count();
        self.state
            .set(GcStateFlags::HAS_FORWARDED | GcStateFlags::EVACUATION, true);
        log_event(BarrierEvent::EvacuationStarted { cset_regions });
    }

    /// Stop evacuating; forwarded objects may still be referenced
    pub fn finish_evacuation(&self) {
        self.state.set(GcStateFlags::EVACUATION, false);
        let stats = self.stats.snapshot();
        log_event(BarrierEvent::EvacuationFinished {
            objects_evacuated: stats.objects_evacuated,
            failures: stats.evacuation_failures,
        });
    }

    /// All references updated: nothing needs healing any more
    pub fn finish_update_refs(&self) {
        self.state.set(GcStateFlags::HAS_FORWARDED, false);
        self.heap.clear_collection_set();
        let dirty_regions = self
            .heap
            .regions()
            .iter()
            .filter(|r| r.is_dirty())
            .count();
        log_event(BarrierEvent::UpdateRefsFinished { dirty_regions });
    }

    /// Set or clear arbitrary state flags
    pub fn set_gc_state(&self, flags: GcStateFlags, value: bool) -> GcStateFlags {
        self.state.set(flags, value)
    }

    // === SATB ===

    /// Log `obj` for marking, counting the enqueue and any hand-off
    #[inline]
    pub fn satb_enqueue(&self, queue: &mut SatbQueue, obj: ObjectReference) {
        self.satb_enqueue_at(queue, self.satb.generation(), obj);
    }

    #[inline]
    fn satb_enqueue_at(&self, queue: &mut SatbQueue, generation: u64, obj: ObjectReference) {
        self.stats.record(Counter::SatbEnqueue);
        if self.satb.enqueue_at(queue, generation, obj) == EnqueueOutcome::HandedOff {
            self.stats.record(Counter::HandOff);
        }
    }

    /// Hand off a thread's partial buffer
    pub fn flush(&self, queue: &mut SatbQueue) -> usize {
        self.satb.flush(queue)
    }

    // === Resolution ===

    /// Authoritative copy of `obj`
    #[inline]
    pub fn resolve(&self, obj: ObjectReference) -> ObjectReference {
        relocate::resolve(&self.heap, obj)
    }

    /// Authoritative copy of a narrow reference, in narrow form
    #[inline]
    pub fn resolve_narrow(&self, narrow: NarrowOop) -> NarrowOop {
        relocate::resolve_narrow(&self.heap, narrow)
    }

    /// Resolve for a write: the object a store into `src` must go to
    ///
    /// Evacuates `src` first when it sits in the collection set during
    /// evacuation and nobody has moved it yet.
    #[inline]
    fn resolve_for_write(&self, src: ObjectReference, evacuate: bool) -> ObjectReference {
        if let ForwardingState::ForwardedTo(target) = self.heap.forwarding_state(src) {
            self.stats.record(Counter::ForwardedResolution);
            return target;
        }
        if !evacuate || !self.heap.in_collection_set(src) {
            return src;
        }

        match self.evacuator.evacuate(&self.heap, src) {
            Evacuation::Copied(target) => {
                self.stats.record(Counter::Evacuated);
                target
            }
            Evacuation::AlreadyForwarded(target) => {
                self.stats.record(Counter::ForwardedResolution);
                target
            }
            Evacuation::Failed => {
                self.stats.record(Counter::EvacuationFailure);
                self.resolve(src)
            }
        }
    }

    /// Shared write barrier behind both entry conventions
    #[inline]
    pub fn write_barrier(&self, src: Option<ObjectReference>) -> Option<ObjectReference> {
        self.stats.record(Counter::WriteBarrier);
        let src = src?;
        crate::barrier_guarantee!(
            self.heap.is_oop(src),
            "write barrier on {:?}, not an object of this heap",
            src
        );
        Some(self.resolve_for_write(src, self.state.is_evacuating()))
    }

    // === Pre-Write Barriers ===

    /// Log `original` before a single field store overwrites it
    #[inline]
    pub fn write_ref_field_pre(&self, queue: &mut SatbQueue, original: ObjectReference) {
        self.stats.record(Counter::FieldPre);
        crate::barrier_guarantee!(
            self.heap.is_oop(original),
            "field pre-barrier on {:?}, not an object of this heap",
            original
        );
        if let Some(generation) = self.satb.active_generation() {
            self.satb_enqueue_at(queue, generation, original);
        }
    }

    /// Log the current value of `count` slots before an array copy
    /// overwrites them
    pub fn write_ref_array_pre(
        &self,
        queue: &mut SatbQueue,
        width: SlotWidth,
        dst: usize,
        count: usize,
    ) {
        self.stats.record(Counter::ArrayPre);
        if count == 0 {
            return;
        }
        let Some(generation) = self.satb.active_generation() else {
            return;
        };
        self.check_slot_range(width, dst, count);

        for i in 0..count {
            if let Some(old) = self.heap.load_ref_as(width, dst + i * width.bytes()) {
                self.satb_enqueue_at(queue, generation, old);
            }
        }
    }

    // === Re-Barriering ===

    #[inline]
    fn slot_policy(&self) -> SlotPolicy {
        let flags = self.state.load();
        SlotPolicy {
            heal: flags.contains(GcStateFlags::HAS_FORWARDED),
            evacuate: flags.contains(GcStateFlags::EVACUATION),
            enqueue: self.satb.active_generation(),
        }
    }

    /// Treat one freshly written slot as individually barriered
    #[inline]
    fn rebarrier_slot(&self, queue: &mut SatbQueue, slot: usize, policy: SlotPolicy) {
        let Some(mut obj) = self.heap.load_ref(slot) else {
            return;
        };

        if policy.heal {
            let target = self.resolve_for_write(obj, policy.evacuate);
            if target != obj {
                // A lost race means someone stored a newer value; keep it.
                if self.heap.compare_exchange_ref(slot, obj, target) {
                    self.stats.record(Counter::SlotHealed);
                }
                obj = target;
            }
        }

        if let Some(generation) = policy.enqueue {
            self.satb_enqueue_at(queue, generation, obj);
        }
    }

    /// Re-barrier `count` slots starting at `start` after a bulk copy
    pub fn write_ref_array(&self, queue: &mut SatbQueue, start: usize, count: usize) {
        self.stats.record(Counter::ArrayPost);
        if count == 0 {
            return;
        }
        let width = self.heap.slot_width();
        self.check_slot_range(width, start, count);

        let policy = self.slot_policy();
        if !policy.is_noop() {
            for i in 0..count {
                self.rebarrier_slot(queue, start + i * width.bytes(), policy);
            }
        }
        self.heap.dirty_range(start, start + count * width.bytes());
    }

    /// Re-barrier every reference slot of every object inside `mr`
    ///
    /// `mr` must start at an object boundary.
    pub fn write_region(&self, queue: &mut SatbQueue, mr: MemRegion) {
        if mr.is_empty() {
            return;
        }
        crate::barrier_guarantee!(
            self.heap.reserved().contains_region(&mr),
            "{:?} outside the heap {:?}",
            mr,
            self.heap.reserved()
        );

        let policy = self.slot_policy();
        if !policy.is_noop() {
            let width = self.heap.slot_width().bytes();
            self.heap.object_iterate(mr, |obj| {
                let (first, count) = self.heap.ref_slots(obj);
                for slot in (0..count).map(|i| first + i * width) {
                    if mr.contains(slot) {
                        self.rebarrier_slot(queue, slot, policy);
                    }
                }
            });
        }
        self.heap.dirty_regions(mr);
    }

    /// Re-barrier a freshly cloned object
    pub fn clone_barrier(&self, queue: &mut SatbQueue, obj: ObjectReference) {
        self.stats.record(Counter::Clone);
        crate::barrier_guarantee!(
            self.heap.is_oop(obj),
            "clone barrier on {:?}, not an object of this heap",
            obj
        );
        self.write_region(queue, self.heap.object_region(obj));
    }

    fn check_slot_range(&self, width: SlotWidth, start: usize, count: usize) {
        crate::barrier_guarantee!(
            start % width.bytes() == 0
                && self.heap.contains(start)
                && count
                    .checked_mul(width.bytes())
                    .and_then(|len| start.checked_add(len))
                    .is_some_and(|end| end <= self.heap.reserved().end()),
            "slot range {:#x} + {} x {:?} outside the heap",
            start,
            count,
            width
        );
    }
}

impl std::fmt::Debug for BarrierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarrierSet")
            .field("heap", &self.heap)
            .field("state", &self.state.load())
            .field("satb", &self.satb)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barrier_set(compressed: bool) -> BarrierSet {
        BarrierSet::new(&BarrierConfig {
            heap_size: 512 * 1024,
            region_size: 64 * 1024,
            satb_buffer_size: 16,
            compressed_refs: compressed,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_field_pre_inactive_is_noop() {
        let bs = barrier_set(true);
        let mut queue = bs.satb_queue_set().new_queue();
        let obj = bs.heap().allocate(2, 0).unwrap();

        bs.write_ref_field_pre(&mut queue, obj);
        assert!(queue.is_empty());
        assert_eq!(bs.stats().field_pre_invocations, 1);
    }

    #[test]
    fn test_field_pre_logs_original_while_marking() {
        let bs = barrier_set(true);
        let mut queue = bs.satb_queue_set().new_queue();
        let obj = bs.heap().allocate(2, 0).unwrap();

        bs.start_marking();
        bs.write_ref_field_pre(&mut queue, obj);
        assert_eq!(queue.entries(), &[obj]);
    }

    #[test]
    fn test_array_pre_skips_nulls() {
        let bs = barrier_set(false);
        let heap = bs.heap();
        let mut queue = bs.satb_queue_set().new_queue();
        let array = heap.allocate(2 + 4, 4).unwrap();
        let a = heap.allocate(2, 0).unwrap();
        let b = heap.allocate(2, 0).unwrap();
        heap.store_ref(heap.ref_slot(array, 0), Some(a));
        heap.store_ref(heap.ref_slot(array, 2), Some(b));

        bs.start_marking();
        bs.write_ref_array_pre(&mut queue, SlotWidth::Oop, heap.ref_slot(array, 0), 4);
        assert_eq!(queue.entries(), &[a, b]);
    }

    #[test]
    fn test_write_ref_array_heals_and_dirties() {
        let bs = barrier_set(true);
        let heap = bs.heap();
        let mut queue = bs.satb_queue_set().new_queue();
        let array = heap.allocate(2 + 2, 3).unwrap();
        let from = heap.allocate(2, 0).unwrap();
        let to = heap.allocate(2, 0).unwrap();
        heap.header(from).try_install_forwarding(to).unwrap();
        heap.store_ref(heap.ref_slot(array, 1), Some(from));

        bs.set_gc_state(GcStateFlags::HAS_FORWARDED, true);
        bs.write_ref_array(&mut queue, heap.ref_slot(array, 0), 3);

        assert_eq!(heap.load_ref(heap.ref_slot(array, 1)), Some(to));
        assert!(heap.region_containing(array.to_raw()).unwrap().is_dirty());
        assert_eq!(bs.stats().slots_healed, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_write_barrier_evacuates_cset_object() {
        let bs = barrier_set(false);
        let heap = bs.heap();
        let obj = heap.allocate(4, 1).unwrap();
        heap.add_to_collection_set(obj.to_raw());

        assert_eq!(bs.write_barrier(Some(obj)), Some(obj));

        bs.start_evacuation();
        let copy = bs.write_barrier(Some(obj)).unwrap();
        assert_ne!(copy, obj);
        assert_eq!(bs.resolve(obj), copy);
        assert_eq!(bs.write_barrier(Some(obj)), Some(copy));
        assert_eq!(bs.stats().objects_evacuated, 1);
    }

    #[test]
    fn test_write_barrier_null() {
        let bs = barrier_set(false);
        assert_eq!(bs.write_barrier(None), None);
    }

    #[test]
    fn test_abandon_marking_drops_logged_entries() {
        let bs = barrier_set(true);
        let mut queue = bs.satb_queue_set().new_queue();
        let obj = bs.heap().allocate(2, 0).unwrap();

        bs.start_marking();
        for _ in 0..20 {
            bs.write_ref_field_pre(&mut queue, obj);
        }
        assert_eq!(bs.abandon_marking(), 16);
        assert!(!bs.satb_queue_set().is_active());
        assert!(!bs.gc_state().is_marking());
    }
}
