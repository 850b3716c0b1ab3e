//! C-ABI barrier entries
//!
//! Generated code calls barriers as plain C functions. Every entry takes
//! the runtime handle as its first argument, so call sites embed the
//! handle address next to the function address and no global lookup is
//! needed. Null references cross this boundary as `0`.
//!
//! The compiled-code (`_jrt`) and interpreter (`_irt`) write barriers are
//! separate symbols so either convention can be patched independently;
//! both end in the one `BarrierSet::write_barrier`.
//!
//! Entries use the `C-unwind` ABI. A violated barrier precondition
//! panics; with unwinding enabled the panic reaches the caller's frame,
//! and under `panic = "abort"` it stops the process at the entry.

use super::{BarrierRuntime, MutatorThread};
use crate::object::ObjectReference;
use std::sync::Arc;

/// Array pre-barrier, full-width slots
///
/// # Safety
/// `runtime` must point to a live runtime and `thread` to a thread
/// attached to it and owned by the caller; `dst..dst + length` must be
/// reference slots of a heap array.
pub unsafe extern "C-unwind" fn fgc_write_ref_array_pre_oop_entry(
    runtime: *const BarrierRuntime,
    thread: *mut MutatorThread,
    dst: *const usize,
    length: usize,
) {
    if length == 0 {
        return;
    }
    let (runtime, thread) = (&*runtime, &mut *thread);
    runtime.write_ref_array_pre_oop(thread, dst, length);
}

/// Array pre-barrier, narrow slots
///
/// # Safety
/// As [`fgc_write_ref_array_pre_oop_entry`].
pub unsafe extern "C-unwind" fn fgc_write_ref_array_pre_narrow_oop_entry(
    runtime: *const BarrierRuntime,
    thread: *mut MutatorThread,
    dst: *const u32,
    length: usize,
) {
    if length == 0 {
        return;
    }
    let (runtime, thread) = (&*runtime, &mut *thread);
    runtime.write_ref_array_pre_narrow_oop(thread, dst, length);
}

/// Array post-barrier
///
/// # Safety
/// As [`fgc_write_ref_array_pre_oop_entry`].
pub unsafe extern "C-unwind" fn fgc_write_ref_array_post_entry(
    runtime: *const BarrierRuntime,
    thread: *mut MutatorThread,
    dst: usize,
    length: usize,
) {
    let (runtime, thread) = (&*runtime, &mut *thread);
    runtime.write_ref_array_post(thread, dst, length);
}

/// Field pre-barrier
///
/// # Safety
/// `runtime` and `thread` as above; `original` must be a non-null object
/// of the runtime's heap.
pub unsafe extern "C-unwind" fn fgc_write_ref_field_pre_entry(
    runtime: *const BarrierRuntime,
    original: usize,
    thread: *mut MutatorThread,
) {
    let Some(original) = ObjectReference::from_raw(original) else {
        crate::barrier_guarantee!(false, "field pre-barrier called with null original");
        return;
    };
    let (runtime, thread) = (&*runtime, &mut *thread);
    runtime.write_ref_field_pre(original, thread);
}

/// Write barrier, compiled-code convention
///
/// # Safety
/// `runtime` must point to a live runtime; `src` must be `0` or an object
/// of its heap.
pub unsafe extern "C-unwind" fn fgc_write_barrier_jrt(runtime: *const BarrierRuntime, src: usize) -> usize {
    ObjectReference::raw_or_null((*runtime).write_barrier_jrt(ObjectReference::from_raw(src)))
}

/// Write barrier, interpreter convention
///
/// # Safety
/// As [`fgc_write_barrier_jrt`].
pub unsafe extern "C-unwind" fn fgc_write_barrier_irt(runtime: *const BarrierRuntime, src: usize) -> usize {
    ObjectReference::raw_or_null((*runtime).write_barrier_irt(ObjectReference::from_raw(src)))
}

/// Clone barrier
///
/// # Safety
/// `runtime` and `thread` as above; `obj` must be a non-null object of
/// the runtime's heap whose contents were just bulk-copied.
pub unsafe extern "C-unwind" fn fgc_clone_barrier(
    runtime: *const BarrierRuntime,
    thread: *mut MutatorThread,
    obj: usize,
) {
    let Some(obj) = ObjectReference::from_raw(obj) else {
        crate::barrier_guarantee!(false, "clone barrier called with null object");
        return;
    };
    let (runtime, thread) = (&*runtime, &mut *thread);
    runtime.clone_barrier(thread, obj);
}

pub type ArrayPreOopFn = unsafe extern "C-unwind" fn(*const BarrierRuntime, *mut MutatorThread, *const usize, usize);
pub type ArrayPreNarrowOopFn = unsafe extern "C-unwind" fn(*const BarrierRuntime, *mut MutatorThread, *const u32, usize);
pub type ArrayPostFn = unsafe extern "C-unwind" fn(*const BarrierRuntime, *mut MutatorThread, usize, usize);
pub type FieldPreFn = unsafe extern "C-unwind" fn(*const BarrierRuntime, usize, *mut MutatorThread);
pub type WriteBarrierFn = unsafe extern "C-unwind" fn(*const BarrierRuntime, usize) -> usize;
pub type CloneBarrierFn = unsafe extern "C-unwind" fn(*const BarrierRuntime, *mut MutatorThread, usize);

/// Entry addresses handed to the code generator and interpreter
///
/// `runtime` is the address of the shared runtime allocation, so it stays
/// valid however the owning `Arc` is moved or cloned. The table does not
/// keep the runtime alive: it is usable while some `Arc` to it exists.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BarrierEntryTable {
    pub runtime: *const BarrierRuntime,
    pub write_ref_array_pre_oop: ArrayPreOopFn,
    pub write_ref_array_pre_narrow_oop: ArrayPreNarrowOopFn,
    pub write_ref_array_post: ArrayPostFn,
    pub write_ref_field_pre: FieldPreFn,
    pub write_barrier_jrt: WriteBarrierFn,
    pub write_barrier_irt: WriteBarrierFn,
    pub clone_barrier: CloneBarrierFn,
}

impl BarrierEntryTable {
    pub(crate) fn new(runtime: &Arc<BarrierRuntime>) -> Self {
        Self {
            runtime: Arc::as_ptr(runtime),
            write_ref_array_pre_oop: fgc_write_ref_array_pre_oop_entry,
            write_ref_array_pre_narrow_oop: fgc_write_ref_array_pre_narrow_oop_entry,
            write_ref_array_post: fgc_write_ref_array_post_entry,
            write_ref_field_pre: fgc_write_ref_field_pre_entry,
            write_barrier_jrt: fgc_write_barrier_jrt,
            write_barrier_irt: fgc_write_barrier_irt,
            clone_barrier: fgc_clone_barrier,
        }
    }
}
