//! # fgc-barrier - Mutator Barriers for a Concurrent Region-Based Collector
//!
//! The runtime entry points compiled code and the interpreter call on
//! every reference-field store, reference-array copy and object clone,
//! so that marking and relocation can run concurrently with mutators.
//!
//! ## Overview
//!
//! Two collector invariants are maintained from the mutator side:
//!
//! - **SATB (snapshot-at-the-beginning)**: while marking, the value a store
//!   is about to overwrite is logged into a per-thread buffer; full buffers
//!   are handed off lock-free to a shared pending log set
//! - **To-space invariant**: once an object is forwarded, barriers only
//!   return and store its new copy; bulk copies heal the slots they wrote
//!
//! ## Quick Start
//!
//! ```rust
//! use fgc_barrier::{init_with_config, BarrierConfig};
//!
//! fn main() -> Result<(), fgc_barrier::BarrierError> {
//!     let runtime = init_with_config(BarrierConfig {
//!         heap_size: 4 * 1024 * 1024,
//!         satb_buffer_size: 256,
//!         ..Default::default()
//!     })?;
//!     let mut thread = runtime.attach_thread()?;
//!
//!     let holder = runtime.heap().allocate(4, 1)?;
//!     let old = runtime.heap().allocate(2, 0)?;
//!     let slot = runtime.heap().ref_slot(holder, 0);
//!     runtime.heap().store_ref(slot, Some(old));
//!
//!     runtime.barrier_set().start_marking();
//!
//!     // Before overwriting the field, log its old value.
//!     runtime.write_ref_field_pre(old, &mut thread);
//!     runtime.heap().store_ref(slot, None);
//!     assert_eq!(thread.satb_entries(), &[old]);
//!
//!     runtime.detach_thread(thread)?;
//!     runtime.teardown()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────── generated code / interpreter ────────────────────┐
//! │   BarrierEntryTable (C-unwind ABI)   BarrierRuntime (Rust methods)   │
//! └───────────────────────────────┬──────────────────────────────────────┘
//!                                 ▼
//! ┌────────────────────────── BarrierSet ────────────────────────────────┐
//! │  GcState flags  │  SatbQueueSet ─▶ PendingLogSet  │  Evacuator       │
//! └───────────────────────────────┬──────────────────────────────────────┘
//!                                 ▼
//! ┌──────────────────────────── Heap ────────────────────────────────────┐
//! │  regions (bump, cset, dirty)  │  object headers (forwarding, layout) │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`barrier`] - SATB buffers, queue set, collector state, barrier set
//! - [`runtime`] - Runtime handle, thread attach/detach, C-ABI entries
//! - [`relocate`] - Forwarding resolution and evacuation
//! - [`heap`] - Region heap the barriers operate on
//! - [`object`] - References, narrow references, object headers
//! - [`config`] - Configuration
//! - [`error`] - Error types and diagnostic checks
//! - [`logging`] - Lifecycle event logging
//!
//! ## Diagnostics
//!
//! Barrier entries do not return errors. Their preconditions are checked
//! by [`barrier_guarantee!`] in debug builds and whenever the
//! `diagnostics` feature is on (the default); a violation logs and panics.

pub mod barrier;
pub mod config;
pub mod error;
pub mod heap;
pub mod logging;
pub mod object;
pub mod relocate;
pub mod runtime;
pub mod util;

pub use barrier::{BarrierSet, BarrierStats, GcStateFlags, PendingLogSet, SatbBuffer, SatbQueueSet};
pub use config::{BarrierConfig, ConfigError};
pub use error::{BarrierError, Result};
pub use heap::{Heap, MemRegion, SlotWidth};
pub use object::{CompressedOops, ForwardingState, NarrowOop, ObjectReference};
pub use runtime::{
    init_default, init_from_env, init_once, init_with_config, is_process_initialized,
    BarrierEntryTable, BarrierRuntime, MutatorThread, RuntimeInitializer, RuntimeState,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
