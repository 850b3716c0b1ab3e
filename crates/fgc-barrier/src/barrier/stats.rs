//! Barrier Statistics - Performance Monitoring
//!
//! Counters for the barrier entries, updated with relaxed atomics from any
//! mutator thread. Statistics are used for:
//! - Debugging and profiling
//! - Tuning the SATB buffer size
//! - Checking how much healing and evacuation the mutators end up doing
//!
//! Counting can be switched off with `BarrierConfig::stats_enabled`, in
//! which case every `record_*` call is a single predictable branch.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// BarrierStats - point-in-time snapshot of the barrier counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BarrierStats {
    /// Field pre-barrier calls
    pub field_pre_invocations: u64,
    /// Array pre-barrier calls
    pub array_pre_invocations: u64,
    /// Array post-barrier calls
    pub array_post_invocations: u64,
    /// Clone barrier calls
    pub clone_invocations: u64,
    /// Write barrier calls (both entry conventions)
    pub write_barrier_invocations: u64,
    /// References logged into SATB buffers
    pub satb_enqueues: u64,
    /// Full buffers handed off to the pending log set
    pub buffers_handed_off: u64,
    /// Resolutions that found a forwarded object
    pub forwarded_resolutions: u64,
    /// Slots healed to their to-space value
    pub slots_healed: u64,
    /// Objects evacuated by the write barrier
    pub objects_evacuated: u64,
    /// Evacuations that found no to-space
    pub evacuation_failures: u64,
}

impl BarrierStats {
    /// Merge stats from another source (for aggregation)
    pub fn merge(&mut self, other: &BarrierStats) {
        self.field_pre_invocations += other.field_pre_invocations;
        self.array_pre_invocations += other.array_pre_invocations;
        self.array_post_invocations += other.array_post_invocations;
        self.clone_invocations += other.clone_invocations;
        self.write_barrier_invocations += other.write_barrier_invocations;
        self.satb_enqueues += other.satb_enqueues;
        self.buffers_handed_off += other.buffers_handed_off;
        self.forwarded_resolutions += other.forwarded_resolutions;
        self.slots_healed += other.slots_healed;
        self.objects_evacuated += other.objects_evacuated;
        self.evacuation_failures += other.evacuation_failures;
    }

    /// Total barrier entry calls
    pub fn total_invocations(&self) -> u64 {
        self.field_pre_invocations
            + self.array_pre_invocations
            + self.array_post_invocations
            + self.clone_invocations
            + self.write_barrier_invocations
    }

    /// Average entries per handed-off buffer
    pub fn entries_per_hand_off(&self) -> f64 {
        if self.buffers_handed_off == 0 {
            0.0
        } else {
            self.satb_enqueues as f64 / self.buffers_handed_off as f64
        }
    }

    /// Fraction of write barrier calls that returned a forwarded copy (percentage)
    pub fn forwarded_rate(&self) -> f64 {
        if self.write_barrier_invocations == 0 {
            0.0
        } else {
            (self.forwarded_resolutions as f64 / self.write_barrier_invocations as f64) * 100.0
        }
    }

    /// Print stats for debugging
    pub fn print(&self) {
        println!("Barrier Statistics:");
        println!("  Total invocations: {}", self.total_invocations());
        println!("  Field pre-barriers: {}", self.field_pre_invocations);
        println!("  Array pre-barriers: {}", self.array_pre_invocations);
        println!("  Array post-barriers: {}", self.array_post_invocations);
        println!("  Clone barriers: {}", self.clone_invocations);
        println!(
            "  Write barriers: {} ({:.2}% forwarded)",
            self.write_barrier_invocations,
            self.forwarded_rate()
        );
        println!(
            "  SATB enqueues: {} in {} hand-offs",
            self.satb_enqueues, self.buffers_handed_off
        );
        println!("  Slots healed: {}", self.slots_healed);
        println!(
            "  Evacuated: {} (failed: {})",
            self.objects_evacuated, self.evacuation_failures
        );
    }
}

/// Which counter to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    FieldPre,
    ArrayPre,
    ArrayPost,
    Clone,
    WriteBarrier,
    SatbEnqueue,
    HandOff,
    ForwardedResolution,
    SlotHealed,
    Evacuated,
    EvacuationFailure,
}

const COUNTERS: usize = 11;

/// AtomicBarrierStats - thread-safe stats collector
pub struct AtomicBarrierStats {
    enabled: AtomicBool,
    counters: [AtomicU64; COUNTERS],
}

impl AtomicBarrierStats {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Add one to `counter`
    #[inline]
    pub fn record(&self, counter: Counter) {
        self.record_n(counter, 1);
    }

    /// Add `n` to `counter`
    #[inline]
    pub fn record_n(&self, counter: Counter, n: u64) {
        if n != 0 && self.is_enabled() {
            self.counters[counter as usize].fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    /// Get current stats snapshot
    pub fn snapshot(&self) -> BarrierStats {
        BarrierStats {
            field_pre_invocations: self.get(Counter::FieldPre),
            array_pre_invocations: self.get(Counter::ArrayPre),
            array_post_invocations: self.get(Counter::ArrayPost),
            clone_invocations: self.get(Counter::Clone),
            write_barrier_invocations: self.get(Counter::WriteBarrier),
            satb_enqueues: self.get(Counter::SatbEnqueue),
            buffers_handed_off: self.get(Counter::HandOff),
            forwarded_resolutions: self.get(Counter::ForwardedResolution),
            slots_healed: self.get(Counter::SlotHealed),
            objects_evacuated: self.get(Counter::Evacuated),
            evacuation_failures: self.get(Counter::EvacuationFailure),
        }
    }

    /// Reset all stats to zero
    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for AtomicBarrierStats {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for AtomicBarrierStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}
