//! MemRegion - a contiguous range of heap words

use crate::util::constants::WORD_SIZE;
use crate::util::format_address;
use std::fmt;

/// Contiguous heap address range `[start, start + word_size * 8)`
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct MemRegion {
    start: usize,
    word_size: usize,
}

impl MemRegion {
    /// Region of `word_size` words starting at `start`
    #[inline]
    pub const fn new(start: usize, word_size: usize) -> Self {
        Self { start, word_size }
    }

    /// Region spanning `[start, end)`; `end` is rounded down to a word
    #[inline]
    pub const fn from_bounds(start: usize, end: usize) -> Self {
        let bytes = if end > start { end - start } else { 0 };
        Self::new(start, bytes / WORD_SIZE)
    }

    #[inline]
    pub const fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.word_size * WORD_SIZE
    }

    #[inline]
    pub const fn word_size(&self) -> usize {
        self.word_size
    }

    #[inline]
    pub const fn byte_size(&self) -> usize {
        self.word_size * WORD_SIZE
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.word_size == 0
    }

    /// Does the range contain `address`
    #[inline]
    pub const fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end()
    }

    /// Does the range contain all of `other`
    #[inline]
    pub const fn contains_region(&self, other: &MemRegion) -> bool {
        other.is_empty() || (other.start >= self.start && other.end() <= self.end())
    }

    /// Overlap of two ranges, empty if disjoint
    pub fn intersection(&self, other: &MemRegion) -> MemRegion {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        MemRegion::from_bounds(start, end)
    }
}

impl fmt::Debug for MemRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemRegion[{}, {})",
            format_address(self.start),
            format_address(self.end())
        )
    }
}
