//! Mutator threads as the barrier layer sees them
//!
//! A [`MutatorThread`] is the per-thread state a barrier entry may touch:
//! the thread's SATB queue. It is handed out by
//! [`BarrierRuntime::attach_thread`](super::BarrierRuntime::attach_thread),
//! owned by the thread it describes, and passed to entries by `&mut`, so
//! no other thread can reach its buffer.

use crate::barrier::SatbQueue;
use crate::object::ObjectReference;

/// Per-thread barrier state
#[derive(Debug)]
pub struct MutatorThread {
    id: u64,
    runtime_id: u64,
    pub(crate) satb: SatbQueue,
}

impl MutatorThread {
    pub(crate) fn new(id: u64, runtime_id: u64, satb: SatbQueue) -> Self {
        Self {
            id,
            runtime_id,
            satb,
        }
    }

    /// Thread id, unique within its runtime
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the runtime this thread is attached to
    #[inline]
    pub fn runtime_id(&self) -> u64 {
        self.runtime_id
    }

    /// The thread's SATB queue
    #[inline]
    pub fn satb_queue(&self) -> &SatbQueue {
        &self.satb
    }

    #[inline]
    pub fn satb_queue_mut(&mut self) -> &mut SatbQueue {
        &mut self.satb
    }

    /// Entries in the thread's current SATB buffer
    pub fn satb_entries(&self) -> &[ObjectReference] {
        self.satb.entries()
    }
}
