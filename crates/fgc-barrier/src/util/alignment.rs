//! Alignment Utilities
//!
//! Helper functions for memory alignment.

/// Alignment - utility for alignment operations
pub struct Alignment;

impl Alignment {
    /// Align value up to boundary
    ///
    /// `alignment` must be a power of two.
    ///
    /// # Examples
    /// ```
    /// use fgc_barrier::util::Alignment;
    ///
    /// assert_eq!(Alignment::align_up(100, 8), 104);
    /// assert_eq!(Alignment::align_up(64, 8), 64);
    /// ```
    #[inline]
    pub const fn align_up(value: usize, alignment: usize) -> usize {
        (value + alignment - 1) & !(alignment - 1)
    }

    /// Align value down to boundary
    #[inline]
    pub const fn align_down(value: usize, alignment: usize) -> usize {
        value & !(alignment - 1)
    }

    /// Check if value is aligned
    #[inline]
    pub const fn is_aligned(value: usize, alignment: usize) -> bool {
        value & (alignment - 1) == 0
    }

    /// Round a byte count up to whole heap words
    #[inline]
    pub const fn bytes_to_words(bytes: usize) -> usize {
        Self::align_up(bytes, Self::WORD) / Self::WORD
    }

    /// Heap word alignment (8 bytes)
    pub const WORD: usize = 8;

    /// Align to the OS page size (queried once by `page_size`)
    pub fn align_to_page(size: usize) -> usize {
        Self::align_up(size, page_size::get())
    }
}
