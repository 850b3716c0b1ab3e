//! Relocate Module - Forwarding and evacuation
//!
//! Relocation itself (choosing what to move, when, and by which worker)
//! belongs to the collector. The barrier side needs two pieces:
//! - Resolution: map any reference to its authoritative copy
//! - Evacuation: when a mutator writes to a collection-set object that no
//!   worker has moved yet, move it first so the write lands in to-space

pub mod evacuate;
pub mod forwarding;

pub use evacuate::{Evacuation, EvacuationStats, Evacuator};
pub use forwarding::{forwardee, resolve, resolve_narrow, resolve_opt};
