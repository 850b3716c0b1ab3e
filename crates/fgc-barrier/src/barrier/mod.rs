//! Barrier Module - SATB logging & forwarding resolution
//!
//! The collector runs concurrently with mutators, so mutator stores need
//! two kinds of cooperation:
//!
//! SATB (snapshot-at-the-beginning):
//! While marking runs, the value a reference store is about to destroy
//! is logged first. Anything reachable when marking started is then
//! either still reachable through the heap or sitting in a log, so
//! marking cannot miss it.
//!
//! To-space invariant:
//! Once an object is forwarded, mutators only ever see and store its
//! new copy. The write barrier resolves (and if needed evacuates) the
//! object being written to, and bulk copies heal the slots they wrote.
//!
//! Components:
//! - [`state`]: collector phase flags the barriers branch on
//! - [`satb`] / [`queue_set`]: per-thread buffers and the shared pending log
//! - [`barrier_set`]: the barrier operations themselves
//! - [`stats`]: invocation counters

pub mod barrier_set;
pub mod queue_set;
pub mod satb;
pub mod state;
pub mod stats;

pub use barrier_set::BarrierSet;
pub use queue_set::{EnqueueOutcome, PendingLogSet, SatbQueueSet};
pub use satb::{BufferAllocator, SatbBuffer, SatbQueue};
pub use state::{GcState, GcStateFlags};
pub use stats::{AtomicBarrierStats, BarrierStats, Counter};
