//! Test Utilities for the Barrier Test Suite
//!
//! Fixtures build a small, started runtime; helpers build objects with
//! known reference contents and make strict assertions about what the
//! barriers logged.
//!
//! ============================================================================
//! Assertions compare exact multisets: a missing or extra SATB entry is a bug.
//! ============================================================================

#![allow(dead_code)]

use fgc_barrier::object::HEADER_WORDS;
use fgc_barrier::{BarrierConfig, BarrierRuntime, MutatorThread, ObjectReference};
use std::sync::Arc;

/// Heap size for tests (4MB)
pub const TEST_HEAP_SIZE: usize = 4 * 1024 * 1024;

/// Region size for tests (64KB)
pub const TEST_REGION_SIZE: usize = 64 * 1024;

/// ============================================================================
/// BARRIER FIXTURE
/// ============================================================================

/// Test fixture owning a started runtime
pub struct BarrierFixture {
    pub runtime: Arc<BarrierRuntime>,
    pub config: BarrierConfig,
}

impl BarrierFixture {
    /// Compressed heap, default buffer size
    pub fn with_defaults() -> Self {
        Self::with_config(Self::base_config())
    }

    /// Compressed heap with SATB buffers of `size` entries
    ///
    /// **Bug this finds:** Off-by-one in the hand-off threshold
    pub fn with_buffer_size(size: usize) -> Self {
        Self::with_config(BarrierConfig {
            satb_buffer_size: size,
            ..Self::base_config()
        })
    }

    /// Full-width reference slots
    ///
    /// **Bug this finds:** Code paths that assume narrow slots
    pub fn uncompressed() -> Self {
        Self::with_config(BarrierConfig {
            compressed_refs: false,
            ..Self::base_config()
        })
    }

    pub fn with_config(config: BarrierConfig) -> Self {
        let runtime = fgc_barrier::init_with_config(config.clone())
            .expect("runtime initialization should succeed with a valid config");
        Self {
            runtime: Arc::new(runtime),
            config,
        }
    }

    fn base_config() -> BarrierConfig {
        BarrierConfig {
            heap_size: TEST_HEAP_SIZE,
            region_size: TEST_REGION_SIZE,
            ..Default::default()
        }
    }

    pub fn heap(&self) -> &fgc_barrier::Heap {
        self.runtime.heap()
    }

    pub fn attach(&self) -> MutatorThread {
        self.runtime
            .attach_thread()
            .expect("attaching to a running runtime should succeed")
    }

    /// Object with `ref_slots` null reference slots and no other payload
    pub fn object(&self, ref_slots: usize) -> ObjectReference {
        self.heap()
            .allocate(HEADER_WORDS + ref_slots.max(1), ref_slots)
            .unwrap_or_else(|e| panic!("allocation with {} slots failed: {}", ref_slots, e))
    }

    /// `count` distinct leaf objects
    pub fn leaves(&self, count: usize) -> Vec<ObjectReference> {
        (0..count).map(|_| self.object(0)).collect()
    }

    /// Object whose reference slots hold `values`
    pub fn object_with_refs(&self, values: &[Option<ObjectReference>]) -> ObjectReference {
        let obj = self.object(values.len());
        for (i, value) in values.iter().enumerate() {
            self.heap().store_ref(self.heap().ref_slot(obj, i), *value);
        }
        obj
    }

    /// Current reference slot values of `obj`
    pub fn refs_of(&self, obj: ObjectReference) -> Vec<Option<ObjectReference>> {
        let heap = self.heap();
        (0..heap.header(obj).ref_slots())
            .map(|i| heap.load_ref(heap.ref_slot(obj, i)))
            .collect()
    }

    /// Forward `from` to a fresh object of the same shape
    pub fn forward(&self, from: ObjectReference) -> ObjectReference {
        let header = self.heap().header(from);
        let to = self
            .heap()
            .allocate(header.size_words(), header.ref_slots())
            .expect("allocation of forwardee should succeed");
        header
            .try_install_forwarding(to)
            .expect("object should not be forwarded yet");
        to
    }

    /// Every pending SATB entry, draining the pending log set
    pub fn drain(&self) -> Vec<ObjectReference> {
        self.runtime
            .barrier_set()
            .satb_queue_set()
            .drain_completed()
    }
}

/// ============================================================================
/// STRICT ASSERTIONS
/// ============================================================================

/// Assert two sequences hold the same entries with the same multiplicities
///
/// **Bug this finds:** Lost or duplicated SATB entries
#[track_caller]
pub fn assert_same_multiset(actual: &[ObjectReference], expected: &[ObjectReference]) {
    let mut actual = actual.to_vec();
    let mut expected = expected.to_vec();
    actual.sort();
    expected.sort();
    assert_eq!(
        actual, expected,
        "SATB entries differ (sorted actual vs expected)"
    );
}

/// Assert `reference` lies inside the managed heap
///
/// **Bug this finds:** Resolution returning a stale or foreign address
#[track_caller]
pub fn assert_in_heap(fixture: &BarrierFixture, reference: ObjectReference) {
    assert!(
        fixture.heap().is_oop(reference),
        "{:?} is not an object of the heap {:?}",
        reference,
        fixture.heap().reserved()
    );
}
