//! Object Module - What the barriers need to know about heap objects
//!
//! References in full and narrow encodings, and the two-word header that
//! carries the forwarding state and the object's layout.

pub mod header;
pub mod reference;

pub use header::{ForwardingState, ObjectHeader, HEADER_SIZE, HEADER_WORDS};
pub use reference::{CompressedOops, NarrowOop, ObjectReference};
