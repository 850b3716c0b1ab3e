//! Object Header - Forwarding and layout words
//!
//! Object Header Layout (16 bytes on 64-bit):
//! ┌─────────────────────────────────────────┐
//! │       Forwarding Word (8 bytes)         │  <- AtomicUsize
//! │  - 0: not forwarded                     │
//! │  - target | 0b11: forwarded to target   │
//! ├─────────────────────────────────────────┤
//! │         Layout Word (8 bytes)           │  <- AtomicUsize
//! │  - Bits 0-31:  size in words (w/ hdr)   │
//! │  - Bits 32-63: reference slot count     │
//! └─────────────────────────────────────────┘
//! ┌─────────────────────────────────────────┐
//! │  ref slot 0 .. ref slot n-1             │  <- 8 or 4 bytes each
//! ├─────────────────────────────────────────┤
//! │  primitive payload                      │
//! └─────────────────────────────────────────┘
//!
//! The forwarding word is read through [`ObjectHeader::forwarding_state`],
//! which decodes it into an explicit [`ForwardingState`]. It is installed
//! at most once per relocation by a single compare-exchange from zero; the
//! `AcqRel` success ordering publishes the to-space copy to every reader
//! that subsequently observes the forwarded state with `Acquire`.

use super::ObjectReference;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Size of object header in words
pub const HEADER_WORDS: usize = 2;

/// Size of object header in bytes
pub const HEADER_SIZE: usize = HEADER_WORDS * std::mem::size_of::<usize>();

/// Tag marking a forwarding word as forwarded
pub const FORWARDED_TAG: usize = 0b11;

/// Mask extracting the forwardee from a forwarding word
pub const FORWARDEE_MASK: usize = !FORWARDED_TAG;

const SIZE_MASK: usize = u32::MAX as usize;
const REF_SLOTS_SHIFT: u32 = 32;

/// Forwarding state of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardingState {
    /// Object has not been relocated; it is its own authoritative copy
    NotForwarded,
    /// Object has been relocated to the given to-space copy
    ForwardedTo(ObjectReference),
}

impl ForwardingState {
    #[inline]
    fn decode(word: usize) -> Self {
        if word & FORWARDED_TAG == FORWARDED_TAG {
            match ObjectReference::from_raw(word & FORWARDEE_MASK) {
                Some(target) => ForwardingState::ForwardedTo(target),
                None => ForwardingState::NotForwarded,
            }
        } else {
            ForwardingState::NotForwarded
        }
    }

    #[inline]
    fn encode(target: ObjectReference) -> usize {
        target.to_raw() | FORWARDED_TAG
    }

    /// Is the object relocated
    #[inline]
    pub fn is_forwarded(self) -> bool {
        matches!(self, ForwardingState::ForwardedTo(_))
    }
}

/// Object Header
///
/// Every heap object starts with this header.
#[repr(C)]
pub struct ObjectHeader {
    forwarding: AtomicUsize,
    layout: AtomicUsize,
}

impl ObjectHeader {
    /// Encode a layout word
    #[inline]
    pub const fn layout_word(size_words: usize, ref_slots: usize) -> usize {
        (size_words & SIZE_MASK) | ((ref_slots & SIZE_MASK) << REF_SLOTS_SHIFT)
    }

    /// Initialize a freshly allocated header
    ///
    /// The object is not yet published, so relaxed stores suffice; the
    /// store that publishes the reference provides the ordering.
    #[inline]
    pub fn initialize(&self, size_words: usize, ref_slots: usize) {
        self.forwarding.store(0, Ordering::Relaxed);
        self.layout
            .store(Self::layout_word(size_words, ref_slots), Ordering::Relaxed);
    }

    /// Raw layout word, for copying
    #[inline]
    pub fn raw_layout(&self) -> usize {
        self.layout.load(Ordering::Relaxed)
    }

    /// Object size in words, header included
    #[inline]
    pub fn size_words(&self) -> usize {
        self.raw_layout() & SIZE_MASK
    }

    /// Object size in bytes, header included
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.size_words() * std::mem::size_of::<usize>()
    }

    /// Number of reference slots following the header
    #[inline]
    pub fn ref_slots(&self) -> usize {
        self.raw_layout() >> REF_SLOTS_SHIFT
    }

    // === Forwarding Operations ===

    /// Read the forwarding state
    #[inline]
    pub fn forwarding_state(&self) -> ForwardingState {
        ForwardingState::decode(self.forwarding.load(Ordering::Acquire))
    }

    /// Check if object is forwarded (relocated)
    #[inline]
    pub fn is_forwarded(&self) -> bool {
        self.forwarding_state().is_forwarded()
    }

    /// Install the forwarding pointer
    ///
    /// Succeeds only for the first caller. Losers get the winning target
    /// back in `Err` and must use it instead of their own copy.
    #[inline]
    pub fn try_install_forwarding(
        &self,
        target: ObjectReference,
    ) -> Result<(), ObjectReference> {
        match self.forwarding.compare_exchange(
            0,
            ForwardingState::encode(target),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => match ForwardingState::decode(current) {
                ForwardingState::ForwardedTo(winner) => Err(winner),
                // Forwarding words only ever leave zero by becoming forwarded.
                ForwardingState::NotForwarded => Err(target),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> ObjectHeader {
        let header = ObjectHeader {
            forwarding: AtomicUsize::new(usize::MAX),
            layout: AtomicUsize::new(usize::MAX),
        };
        header.initialize(8, 3);
        header
    }

    #[test]
    fn test_layout_word() {
        let header = header();
        assert_eq!(header.size_words(), 8);
        assert_eq!(header.size_bytes(), 64);
        assert_eq!(header.ref_slots(), 3);
    }

    #[test]
    fn test_fresh_header_not_forwarded() {
        let header = header();
        assert_eq!(header.forwarding_state(), ForwardingState::NotForwarded);
        assert!(!header.is_forwarded());
    }

    #[test]
    fn test_install_forwarding_once() {
        let header = header();
        let first = ObjectReference::from_raw(0x2000).unwrap();
        let second = ObjectReference::from_raw(0x3000).unwrap();

        assert_eq!(header.try_install_forwarding(first), Ok(()));
        assert_eq!(header.try_install_forwarding(second), Err(first));
        assert_eq!(
            header.forwarding_state(),
            ForwardingState::ForwardedTo(first)
        );
    }
}
