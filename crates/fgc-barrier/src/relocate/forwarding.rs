//! Forwarding Resolution - The to-space invariant
//!
//! Every object carries its own forwarding word (see
//! [`ObjectHeader`](crate::object::ObjectHeader)); there is no side table.
//! Resolution reads it once:
//!
//! ```text
//! NotForwarded        -> obj
//! ForwardedTo(target) -> target
//! ```
//!
//! Targets are never themselves forwarded while they are live, so one
//! step is enough and resolving twice gives the same answer. A resolve
//! that races an install may return the old address once; any resolve
//! that starts after the install observes the target.

use crate::heap::Heap;
use crate::object::{ForwardingState, NarrowOop, ObjectReference};

/// Authoritative copy of `obj`
#[inline]
pub fn resolve(heap: &Heap, obj: ObjectReference) -> ObjectReference {
    match heap.forwarding_state(obj) {
        ForwardingState::NotForwarded => obj,
        ForwardingState::ForwardedTo(target) => target,
    }
}

/// Authoritative copy of a nullable reference
#[inline]
pub fn resolve_opt(heap: &Heap, obj: Option<ObjectReference>) -> Option<ObjectReference> {
    obj.map(|obj| resolve(heap, obj))
}

/// Resolve a narrow reference, returning it in narrow form
#[inline]
pub fn resolve_narrow(heap: &Heap, narrow: NarrowOop) -> NarrowOop {
    if narrow.is_null() {
        return narrow;
    }
    heap.encode(resolve_opt(heap, heap.decode(narrow)))
}

/// Forwardee of `obj`, if it has one
#[inline]
pub fn forwardee(heap: &Heap, obj: ObjectReference) -> Option<ObjectReference> {
    match heap.forwarding_state(obj) {
        ForwardingState::ForwardedTo(target) => Some(target),
        ForwardingState::NotForwarded => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BarrierConfig;

    fn heap() -> Heap {
        Heap::new(&BarrierConfig {
            heap_size: 256 * 1024,
            region_size: 64 * 1024,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_unforwarded_resolves_to_itself() {
        let heap = heap();
        let obj = heap.allocate(4, 1).unwrap();
        assert_eq!(resolve(&heap, obj), obj);
        assert_eq!(forwardee(&heap, obj), None);
    }

    #[test]
    fn test_forwarded_resolves_to_target_idempotently() {
        let heap = heap();
        let from = heap.allocate(4, 1).unwrap();
        let to = heap.allocate(4, 1).unwrap();
        heap.header(from).try_install_forwarding(to).unwrap();

        let once = resolve(&heap, from);
        assert_eq!(once, to);
        assert_eq!(resolve(&heap, once), once);
    }

    #[test]
    fn test_narrow_agrees_with_full() {
        let heap = heap();
        let from = heap.allocate(4, 1).unwrap();
        let to = heap.allocate(4, 1).unwrap();
        heap.header(from).try_install_forwarding(to).unwrap();

        let narrow = resolve_narrow(&heap, heap.encode(Some(from)));
        assert_eq!(heap.decode(narrow), Some(resolve(&heap, from)));
        assert_eq!(resolve_narrow(&heap, NarrowOop::NULL), NarrowOop::NULL);
    }
}
