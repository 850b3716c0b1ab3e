//! Runtime Module - Barrier entry points for generated code
//!
//! This module is the boundary compiled code and the interpreter call
//! into. Manages:
//! - The runtime handle owning the barrier set (no global lookup)
//! - Mutator thread attach/detach
//! - The barrier entries, as Rust methods and as a C-ABI table
//!
//! Lifecycle:
//! ```text
//! RuntimeInitializer::initialize ──▶ Running ──teardown──▶ Stopping ──▶ Stopped
//! ```
//!
//! Entries never lock: the lifecycle mutex is only taken by attach,
//! detach and teardown. Entries check liveness with an atomic flag in
//! diagnostic builds.

pub mod entry;
pub mod init;
pub mod thread;

pub use entry::BarrierEntryTable;
pub use init::{
    init_default, init_from_env, init_once, init_with_config, is_process_initialized,
    RuntimeInitializer,
};
pub use thread::MutatorThread;

use crate::barrier::{BarrierSet, BarrierStats};
use crate::config::BarrierConfig;
use crate::error::{BarrierError, Result};
use crate::heap::{Heap, SlotWidth};
use crate::logging::{log_event, BarrierEvent};
use crate::object::ObjectReference;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Runtime created, not yet accepting threads
    Initialized,
    /// Runtime running normally
    Running,
    /// Runtime is stopping
    Stopping,
    /// Runtime has stopped
    Stopped,
}

/// BarrierRuntime - owned handle to the barrier layer
pub struct BarrierRuntime {
    id: u64,
    config: BarrierConfig,
    barrier_set: Arc<BarrierSet>,
    state: Mutex<RuntimeState>,
    live: AtomicBool,
    attached: AtomicUsize,
    next_thread_id: AtomicU64,
}

impl BarrierRuntime {
    /// Create a runtime; it accepts threads once started
    pub fn new(config: BarrierConfig) -> Result<Self> {
        let barrier_set = Arc::new(BarrierSet::new(&config)?);
        Ok(Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            config,
            barrier_set,
            state: Mutex::new(RuntimeState::Initialized),
            live: AtomicBool::new(false),
            attached: AtomicUsize::new(0),
            next_thread_id: AtomicU64::new(1),
        })
    }

    /// Start accepting threads and barrier calls
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != RuntimeState::Initialized {
            return Err(BarrierError::InvalidState {
                expected: format!("{:?}", RuntimeState::Initialized),
                actual: format!("{:?}", *state),
            });
        }
        *state = RuntimeState::Running;
        self.live.store(true, Ordering::Release);
        Ok(())
    }

    /// Tear the runtime down
    ///
    /// Aborts any marking in progress. Threads still attached can only be
    /// detached afterwards.
    pub fn teardown(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != RuntimeState::Running {
                return Err(BarrierError::InvalidState {
                    expected: format!("{:?}", RuntimeState::Running),
                    actual: format!("{:?}", *state),
                });
            }
            *state = RuntimeState::Stopping;
        }
        self.live.store(false, Ordering::Release);

        if self.barrier_set.satb_queue_set().is_active() {
            self.barrier_set.abandon_marking();
        }

        *self.state.lock() = RuntimeState::Stopped;
        log_event(BarrierEvent::RuntimeTornDown {
            threads_detached: self.attached.load(Ordering::Relaxed),
        });
        Ok(())
    }

    /// Unique id of this runtime
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get runtime state
    pub fn state(&self) -> RuntimeState {
        *self.state.lock()
    }

    /// Does the runtime accept barrier calls
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    /// The barrier set behind the entries
    #[inline]
    pub fn barrier_set(&self) -> &Arc<BarrierSet> {
        &self.barrier_set
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        self.barrier_set.heap()
    }

    pub fn stats(&self) -> BarrierStats {
        self.barrier_set.stats()
    }

    /// Threads currently attached
    pub fn attached_threads(&self) -> usize {
        self.attached.load(Ordering::Relaxed)
    }

    // === Thread Lifecycle ===

    /// Attach the calling mutator thread
    pub fn attach_thread(&self) -> Result<MutatorThread> {
        let state = self.state.lock();
        if *state != RuntimeState::Running {
            return Err(BarrierError::InvalidState {
                expected: format!("{:?}", RuntimeState::Running),
                actual: format!("{:?}", *state),
            });
        }

        let id = self.next_thread_id.fetch_add(1, Ordering::Relaxed);
        self.attached.fetch_add(1, Ordering::Relaxed);
        log_event(BarrierEvent::ThreadAttached { thread_id: id });
        Ok(MutatorThread::new(
            id,
            self.id,
            self.barrier_set.satb_queue_set().new_queue(),
        ))
    }

    /// Detach a thread, publishing whatever it still has logged
    pub fn detach_thread(&self, mut thread: MutatorThread) -> Result<usize> {
        crate::ensure!(
            thread.runtime_id() == self.id,
            BarrierError::InvalidArgument(format!(
                "thread {} belongs to runtime {}, not {}",
                thread.id(),
                thread.runtime_id(),
                self.id
            ))
        );

        let _state = self.state.lock();
        let flushed = self.barrier_set.flush(&mut thread.satb);
        self.attached.fetch_sub(1, Ordering::Relaxed);
        log_event(BarrierEvent::ThreadDetached {
            thread_id: thread.id(),
            flushed,
        });
        Ok(flushed)
    }

    /// Publish a thread's partial SATB buffer without detaching it
    pub fn flush_thread(&self, thread: &mut MutatorThread) -> usize {
        self.check_thread(thread);
        self.barrier_set.flush(&mut thread.satb)
    }

    #[inline]
    fn check_thread(&self, thread: &MutatorThread) {
        crate::barrier_guarantee!(
            self.is_live() && thread.runtime_id() == self.id,
            "thread {} of runtime {} used with runtime {} (live: {})",
            thread.id(),
            thread.runtime_id(),
            self.id,
            self.is_live()
        );
    }

    #[inline]
    fn check_live(&self) {
        crate::barrier_guarantee!(self.is_live(), "barrier call on runtime {} after teardown", self.id);
    }

    // === Barrier Entries ===

    /// Array pre-barrier for full-width slots
    ///
    /// Must run before the copy, with the old contents in place.
    #[inline]
    pub fn write_ref_array_pre_oop(&self, thread: &mut MutatorThread, dst: *const usize, len: usize) {
        self.check_thread(thread);
        self.barrier_set
            .write_ref_array_pre(&mut thread.satb, SlotWidth::Oop, dst as usize, len);
    }

    /// Array pre-barrier for narrow slots
    #[inline]
    pub fn write_ref_array_pre_narrow_oop(
        &self,
        thread: &mut MutatorThread,
        dst: *const u32,
        len: usize,
    ) {
        self.check_thread(thread);
        self.barrier_set
            .write_ref_array_pre(&mut thread.satb, SlotWidth::Narrow, dst as usize, len);
    }

    /// Array post-barrier: re-barrier `len` freshly written slots at `dst`
    #[inline]
    pub fn write_ref_array_post(&self, thread: &mut MutatorThread, dst: usize, len: usize) {
        self.check_thread(thread);
        self.barrier_set.write_ref_array(&mut thread.satb, dst, len);
    }

    /// Field pre-barrier: log `original` before it is overwritten
    #[inline]
    pub fn write_ref_field_pre(&self, original: ObjectReference, thread: &mut MutatorThread) {
        self.check_thread(thread);
        self.barrier_set.write_ref_field_pre(&mut thread.satb, original);
    }

    /// Write barrier, compiled-code convention
    #[inline]
    pub fn write_barrier_jrt(&self, src: Option<ObjectReference>) -> Option<ObjectReference> {
        self.check_live();
        self.barrier_set.write_barrier(src)
    }

    /// Write barrier, interpreter convention
    #[inline]
    pub fn write_barrier_irt(&self, src: Option<ObjectReference>) -> Option<ObjectReference> {
        self.check_live();
        self.barrier_set.write_barrier(src)
    }

    /// Clone barrier: re-barrier every slot of a freshly cloned object
    #[inline]
    pub fn clone_barrier(&self, thread: &mut MutatorThread, obj: ObjectReference) {
        self.check_thread(thread);
        self.barrier_set.clone_barrier(&mut thread.satb, obj);
    }

    /// C-ABI entry table bound to this runtime
    ///
    /// The table points into the `Arc` allocation, which does not move.
    /// It must not be used after the last `Arc` is dropped.
    pub fn entry_table(self: &Arc<Self>) -> BarrierEntryTable {
        BarrierEntryTable::new(self)
    }
}

impl Drop for BarrierRuntime {
    fn drop(&mut self) {
        if self.state() == RuntimeState::Running {
            let _ = self.teardown();
        }
    }
}

impl std::fmt::Debug for BarrierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarrierRuntime")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("attached", &self.attached_threads())
            .field("barrier_set", &self.barrier_set)
            .finish()
    }
}
