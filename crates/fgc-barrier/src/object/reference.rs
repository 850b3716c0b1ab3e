//! Object references in their two encodings
//!
//! A full-width [`ObjectReference`] is the object's address. A
//! [`NarrowOop`] is the same address compressed to 32 bits relative to the
//! heap base:
//!
//! ```text
//! narrow = (address - narrow_base) >> 3
//! address = narrow_base + (narrow << 3)
//! ```
//!
//! `narrow_base` sits one word below the first heap word, so no object
//! ever encodes to `0`, which is reserved for null.

use crate::util::constants::{LOG_WORD_SIZE, WORD_SIZE};
use crate::util::format_address;
use std::fmt;
use std::num::NonZeroUsize;

/// Address of a heap object
///
/// Never null; a nullable slot value is `Option<ObjectReference>`, which
/// has the same size thanks to the niche.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectReference(NonZeroUsize);

impl ObjectReference {
    /// Object alignment in bytes
    pub const ALIGNMENT: usize = WORD_SIZE;

    /// Wrap a raw address, `None` for null
    #[inline]
    pub fn from_raw(address: usize) -> Option<Self> {
        NonZeroUsize::new(address).map(Self)
    }

    /// Raw address of the object
    #[inline]
    pub fn to_raw(self) -> usize {
        self.0.get()
    }

    /// Raw address, `0` for null
    #[inline]
    pub fn raw_or_null(reference: Option<Self>) -> usize {
        reference.map_or(0, Self::to_raw)
    }

    /// Is the address object-aligned
    #[inline]
    pub fn is_aligned(self) -> bool {
        self.to_raw() % Self::ALIGNMENT == 0
    }

    /// Address `offset` bytes into the object
    #[inline]
    pub fn offset(self, offset: usize) -> usize {
        self.to_raw() + offset
    }
}

impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectReference({})", format_address(self.to_raw()))
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.to_raw())
    }
}

/// Compressed 32-bit object reference; `0` is null
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct NarrowOop(u32);

impl NarrowOop {
    /// The null narrow reference
    pub const NULL: NarrowOop = NarrowOop(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NarrowOop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NarrowOop({:#x})", self.0)
    }
}

/// Lossless codec between full and narrow references for one heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedOops {
    base: usize,
    limit: usize,
}

impl CompressedOops {
    /// Codec for a heap occupying `[heap_start, heap_end)`
    pub fn new(heap_start: usize, heap_end: usize) -> Self {
        debug_assert!(heap_start >= WORD_SIZE, "heap cannot start at address zero");
        debug_assert!(
            ((heap_end - heap_start) >> LOG_WORD_SIZE) < u32::MAX as usize,
            "heap {:#x}..{:#x} too large for narrow references",
            heap_start,
            heap_end
        );
        Self {
            base: heap_start - WORD_SIZE,
            limit: heap_end,
        }
    }

    /// Address that narrow value `0` would decode to
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn encode(&self, reference: Option<ObjectReference>) -> NarrowOop {
        match reference {
            None => NarrowOop::NULL,
            Some(obj) => self.encode_not_null(obj),
        }
    }

    #[inline]
    pub fn encode_not_null(&self, obj: ObjectReference) -> NarrowOop {
        let address = obj.to_raw();
        debug_assert!(
            address > self.base && address < self.limit,
            "{:?} outside the compressed heap",
            obj
        );
        NarrowOop(((address - self.base) >> LOG_WORD_SIZE) as u32)
    }

    #[inline]
    pub fn decode(&self, narrow: NarrowOop) -> Option<ObjectReference> {
        if narrow.is_null() {
            return None;
        }
        ObjectReference::from_raw(self.base + ((narrow.raw() as usize) << LOG_WORD_SIZE))
    }
}
